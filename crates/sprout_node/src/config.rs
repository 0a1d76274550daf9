//! Node configuration.

use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Inclusive range of TCP ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub first: u16,
    pub last: u16,
}

impl PortRange {
    pub const fn new(first: u16, last: u16) -> Self {
        Self { first, last }
    }

    /// Iterate the ports in ascending order.
    pub fn iter(&self) -> RangeInclusive<u16> {
        self.first..=self.last
    }
}

/// Configuration for a Sprout node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Host the node server binds to.
    pub listen_host: String,

    /// Port the node server binds to. `0` asks the OS for a free port.
    pub port: u16,

    /// Period of the growth cycle.
    #[serde(with = "duration_serde")]
    pub cycle_interval: Duration,

    /// Pause between starting the server and the first discovery sweep.
    #[serde(with = "duration_serde")]
    pub startup_delay: Duration,

    /// Upper bound for each outbound connect, write and read.
    #[serde(with = "duration_serde")]
    pub dial_timeout: Duration,

    /// Upper bound for reading one inbound request.
    #[serde(with = "duration_serde")]
    pub read_timeout: Duration,

    /// Largest frame accepted from a peer, in bytes.
    pub max_frame_bytes: usize,

    /// Host probed during discovery.
    pub discovery_host: String,

    /// Well-known ports probed during discovery. Our own port is skipped.
    pub discovery_ports: Vec<u16>,

    /// Ports scanned, first-fit, when looking for a replication target.
    pub replication_ports: PortRange,

    /// Minimum survival level before replication is considered.
    pub replication_min_survival: f64,

    /// Replication only happens while fewer peers than this are known.
    pub replication_max_peers: usize,

    /// Optional cap on stored knowledge items. `None` keeps everything.
    pub knowledge_cap: Option<usize>,

    /// Optional cap on registry size. `None` accepts every new peer.
    pub max_peers: Option<usize>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            port: 8000,
            cycle_interval: Duration::from_secs(30),
            startup_delay: Duration::from_secs(2),
            dial_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(5),
            max_frame_bytes: 1024 * 1024,
            discovery_host: "localhost".to_string(),
            discovery_ports: (8000..=8004).collect(),
            replication_ports: PortRange::new(8005, 8099),
            replication_min_survival: 2.0,
            replication_max_peers: 3,
            knowledge_cap: None,
            max_peers: None,
        }
    }
}

impl NodeConfig {
    /// Default config listening on the given port.
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// `host:port` string the server binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.port)
    }

    /// Save the config to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create directory: {e}"))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Load config from a JSON file, or return defaults if the file is missing
    /// or unreadable. Missing keys fall back to their defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str::<NodeConfig>(&data) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Corrupt config file, using defaults: {e}");
                    }
                },
                Err(e) => {
                    tracing::warn!("Cannot read config file, using defaults: {e}");
                }
            }
        }
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(dur: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(dur.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
