//! Process logging setup and per-invocation log capture.

mod capture;

pub use capture::{FunctionLogger, LogCapture, LogLevel};

use crate::runtime::{BridgeConfig, Environment};
use tracing_subscriber::EnvFilter;

/// Install the process-wide subscriber. Call once from the process
/// entry point, before the server starts.
///
/// Locally this is a compact human-readable format; deployed it is one
/// JSON object per line, the shape the platform's log collector
/// ingests. `RUST_LOG` overrides the default level.
pub fn init(config: &BridgeConfig) {
    let default_level = match config.environment {
        Environment::Local => "debug",
        Environment::Deployed => "info",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match config.environment {
        Environment::Local => tracing_subscriber::fmt().with_env_filter(filter).init(),
        Environment::Deployed => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}
