use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when neither `RUST_LOG` nor `--log-filter` is given.
pub const DEFAULT_FILTER: &str = "info,sprout_node=debug,sprout_app=debug";

/// `RUST_LOG` wins; otherwise `filter` is parsed.
pub fn build_filter(filter: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(env_filter) => Ok(env_filter),
        Err(_) => EnvFilter::try_new(filter).with_context(|| format!("Invalid log filter '{filter}'")),
    }
}

/// Initializes console logging, plus a daily-rotated file under `log_dir`
/// when one is given.
///
/// Returns the file writer's guard, which must be kept alive for the
/// duration of the process.
pub fn init_logging(log_dir: Option<&Path>, filter: &str) -> Result<Option<WorkerGuard>> {
    let env_filter = build_filter(filter)?;

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "sprout");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(false)
                .with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(guard)
}
