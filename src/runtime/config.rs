//! Bridge configuration.

use crate::logging::LogLevel;
use std::path::PathBuf;
use std::time::Duration;

/// Deployment mode of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    /// Local development: verbose process logs, raw diagnostics in
    /// error bodies.
    Local,
    /// Anything else: JSON process logs, opaque error pages.
    #[default]
    Deployed,
}

impl Environment {
    /// Detect the deployment mode from `AZURE_FUNCTIONS_ENVIRONMENT`.
    /// Only the value `Development` selects local behavior.
    pub fn detect() -> Self {
        match std::env::var("AZURE_FUNCTIONS_ENVIRONMENT") {
            Ok(value) if value.eq_ignore_ascii_case("development") => Environment::Local,
            _ => Environment::Deployed,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Environment::Local)
    }
}

/// Configuration for the bridge server.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Host address to bind to.
    pub host: String,
    /// Default port, overridden by `FUNCTIONS_CUSTOMHANDLER_PORT`.
    pub port: u16,
    /// Severity bound for per-invocation loggers.
    pub log_level: LogLevel,
    /// Deployment mode.
    pub environment: Environment,
    /// Upper bound on one invocation, handler time included.
    pub invocation_deadline: Duration,
    /// How long in-flight invocations may keep running after a
    /// termination signal.
    pub shutdown_grace: Duration,
    /// Maximum size of an inbound envelope in bytes.
    pub max_body_size: usize,
    /// Version file read at startup in deployed mode.
    pub version_file: PathBuf,
    /// Service identity for the startup log; `WEBSITE_SITE_NAME` is
    /// used when unset.
    pub service_name: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: LogLevel::Info,
            environment: Environment::detect(),
            invocation_deadline: Duration::from_secs(10 * 60),
            shutdown_grace: Duration::from_secs(25),
            max_body_size: 8 * 1024 * 1024, // 8MB
            version_file: PathBuf::from("version.txt"),
            service_name: None,
        }
    }
}

impl BridgeConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the default port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the per-invocation log level.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Set the deployment mode explicitly instead of detecting it.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Set the invocation deadline.
    pub fn invocation_deadline(mut self, deadline: Duration) -> Self {
        self.invocation_deadline = deadline;
        self
    }

    /// Set the shutdown grace window.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the service identity used in the startup log.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Port the host expects the handler to listen on: the value of
    /// `FUNCTIONS_CUSTOMHANDLER_PORT` when set, the configured default
    /// otherwise. The override is taken verbatim; an unusable value
    /// surfaces as a bind failure.
    pub fn handler_port(&self) -> String {
        std::env::var("FUNCTIONS_CUSTOMHANDLER_PORT")
            .ok()
            .filter(|port| !port.is_empty())
            .unwrap_or_else(|| self.port.to_string())
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.handler_port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::new();
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.invocation_deadline, Duration::from_secs(600));
        assert_eq!(config.shutdown_grace, Duration::from_secs(25));
        assert_eq!(config.version_file, PathBuf::from("version.txt"));
    }

    #[test]
    fn test_chained_setters() {
        let config = BridgeConfig::new()
            .host("127.0.0.1")
            .port(9090)
            .log_level(LogLevel::Trace)
            .environment(Environment::Local)
            .service_name("demo");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9090);
        assert_eq!(config.log_level, LogLevel::Trace);
        assert!(config.environment.is_local());
        assert_eq!(config.service_name.as_deref(), Some("demo"));
    }

    #[test]
    fn test_bind_addr_uses_configured_port_without_override() {
        // The override variable is process-global, so this only checks
        // the default side of the resolution.
        if std::env::var("FUNCTIONS_CUSTOMHANDLER_PORT").is_err() {
            let config = BridgeConfig::new().host("127.0.0.1").port(7071);
            assert_eq!(config.bind_addr(), "127.0.0.1:7071");
        }
    }
}
