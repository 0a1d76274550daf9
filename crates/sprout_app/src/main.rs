mod logging;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use sprout_node::{Node, NodeConfig};

#[derive(Parser, Debug)]
#[command(name = "sprout", about = "Self-growing peer-to-peer knowledge node")]
struct Cli {
    /// Port to listen on (overrides the config file; default 8000)
    #[arg(env = "SPROUT_PORT")]
    port: Option<u16>,

    /// JSON config file; missing keys fall back to defaults
    #[arg(long, env = "SPROUT_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind
    #[arg(long)]
    host: Option<String>,

    /// Seconds between growth cycles
    #[arg(long)]
    cycle_secs: Option<u64>,

    /// Also write daily-rotated log files here
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log filter, used when RUST_LOG is unset
    #[arg(long, default_value = logging::DEFAULT_FILTER)]
    log_filter: String,
}

impl Cli {
    /// Load the config file (if any) and apply command-line overrides.
    fn node_config(&self) -> NodeConfig {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load_or_default(path),
            None => NodeConfig::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = &self.host {
            config.listen_host = host.clone();
        }
        if let Some(secs) = self.cycle_secs {
            config.cycle_interval = Duration::from_secs(secs);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init_logging(cli.log_dir.as_deref(), &cli.log_filter)?;

    let config = cli.node_config();
    let listen_addr = config.listen_addr();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        cycle_secs = config.cycle_interval.as_secs_f64(),
        "Starting sprout on {listen_addr}"
    );

    let node = Node::start(config)
        .await
        .with_context(|| format!("Failed to start node on {listen_addr}"))?;
    info!(node = %node.id(), "Node running on {}", node.local_addr());

    shutdown_signal().await;
    info!("Shutting down gracefully");
    node.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Cannot listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_without_arguments() {
        let cli = Cli::try_parse_from(["sprout"]).unwrap();
        assert_eq!(cli.log_filter, logging::DEFAULT_FILTER);
        assert!(cli.log_dir.is_none());
        // SPROUT_PORT may be set in the environment running the tests.
        if std::env::var_os("SPROUT_PORT").is_none() {
            assert_eq!(cli.node_config().port, 8000);
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sprout.json");
        let mut file_config = NodeConfig::with_port(8003);
        file_config.listen_host = "127.0.0.1".into();
        file_config.knowledge_cap = Some(100);
        file_config.save_to_file(&path).unwrap();

        let cli = Cli::try_parse_from([
            "sprout",
            "8010",
            "--config",
            path.to_str().unwrap(),
            "--cycle-secs",
            "5",
        ])
        .unwrap();
        let config = cli.node_config();

        assert_eq!(config.port, 8010);
        assert_eq!(config.listen_host, "127.0.0.1");
        assert_eq!(config.cycle_interval, Duration::from_secs(5));
        assert_eq!(config.knowledge_cap, Some(100));
    }

    #[test]
    fn test_host_override() {
        let cli = Cli::try_parse_from(["sprout", "9000", "--host", "::1"]).unwrap();
        let config = cli.node_config();
        assert_eq!(config.port, 9000);
        assert_eq!(config.listen_host, "::1");
    }
}
