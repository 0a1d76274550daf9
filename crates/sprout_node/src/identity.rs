//! Node identity.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A node identifier, unique enough to tell local instances apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Generate an id of the form `NODE_{port}_{suffix}` with a four-digit
    /// random suffix.
    pub fn generate(port: u16, rng: &mut impl Rng) -> Self {
        let suffix: u16 = rng.random_range(1000..=9999);
        Self(format!("NODE_{port}_{suffix}"))
    }

    /// Create a NodeId from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Return the inner string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who this node is. Fixed once the listening port is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub id: NodeId,
    pub port: u16,
}

impl NodeIdentity {
    /// Create an identity with a freshly generated id for `port`.
    pub fn generate(port: u16) -> Self {
        Self {
            id: NodeId::generate(port, &mut rand::rng()),
            port,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_node_id_format() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = NodeId::generate(8001, &mut rng);
        let suffix = id
            .as_str()
            .strip_prefix("NODE_8001_")
            .expect("port prefix");
        let n: u16 = suffix.parse().unwrap();
        assert!((1000..=9999).contains(&n));
    }

    #[test]
    fn test_node_id_from_string() {
        let id = NodeId::from_string("NODE_9001_1234");
        assert_eq!(id.as_str(), "NODE_9001_1234");
        assert_eq!(format!("{id}"), "NODE_9001_1234");
    }

    #[test]
    fn test_node_id_serializes_as_plain_string() {
        let id = NodeId::from_string("NODE_8000_4242");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"NODE_8000_4242\"");
    }

    #[test]
    fn test_identity_generate() {
        let identity = NodeIdentity::generate(8004);
        assert_eq!(identity.port, 8004);
        assert!(identity.id.as_str().starts_with("NODE_8004_"));
    }
}
