//! Crash reporting for unclassified handler failures.

use bytes::Bytes;
use http_body_util::Full;
use hyper::Request;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// One unclassified handler failure, with enough identity to find the
/// crashing function.
#[derive(Debug, Clone, Serialize)]
pub struct CrashEvent {
    /// Name of the invoked function.
    pub function: String,
    /// Outer HTTP method of the host exchange.
    pub method: String,
    /// Outer request path of the host exchange.
    pub path: String,
    /// Full diagnostic chain of the failure.
    pub message: String,
}

/// Sink for crash events.
///
/// Reporting is fire-and-forget: a report must never delay or fail the
/// invocation that produced it.
pub trait CrashReport: Send + Sync {
    /// Whether events actually go anywhere.
    fn enabled(&self) -> bool;

    /// Submit one event.
    fn report(&self, event: CrashEvent);
}

/// Reporter that drops every event. Used when no collector endpoint is
/// configured.
#[derive(Debug, Default)]
pub struct NoopCrashReporter;

impl CrashReport for NoopCrashReporter {
    fn enabled(&self) -> bool {
        false
    }

    fn report(&self, _event: CrashEvent) {}
}

/// Reporter that posts each event as JSON to a collector endpoint.
pub struct HttpCrashReporter {
    endpoint: String,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpCrashReporter {
    /// Create a reporter posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }
}

impl CrashReport for HttpCrashReporter {
    fn enabled(&self) -> bool {
        true
    }

    fn report(&self, event: CrashEvent) {
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "cannot encode crash event");
                return;
            }
        };

        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            let request = Request::builder()
                .method(hyper::Method::POST)
                .uri(endpoint.as_str())
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(payload)));
            let request = match request {
                Ok(request) => request,
                Err(err) => {
                    warn!(error = %err, "cannot build crash report request");
                    return;
                }
            };
            match client.request(request).await {
                Ok(response) if response.status().is_success() => {
                    debug!(function = %event.function, "crash event reported");
                }
                Ok(response) => {
                    warn!(status = %response.status(), "crash collector rejected event");
                }
                Err(err) => {
                    warn!(error = %err, "cannot deliver crash event");
                }
            }
        });
    }
}

/// Build the reporter from the environment: a non-empty
/// `ERROR_REPORT_URL` enables HTTP reporting, otherwise events are
/// dropped.
pub fn from_env() -> Arc<dyn CrashReport> {
    match std::env::var("ERROR_REPORT_URL") {
        Ok(endpoint) if !endpoint.is_empty() => Arc::new(HttpCrashReporter::new(endpoint)),
        _ => Arc::new(NoopCrashReporter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_reporter_is_disabled() {
        let reporter = NoopCrashReporter;
        assert!(!reporter.enabled());
        reporter.report(CrashEvent {
            function: "demo".to_string(),
            method: "POST".to_string(),
            path: "/demo".to_string(),
            message: "boom".to_string(),
        });
    }

    #[test]
    fn test_crash_event_serializes_flat() {
        let event = CrashEvent {
            function: "items".to_string(),
            method: "POST".to_string(),
            path: "/items".to_string(),
            message: "boom\ncaused by: disk on fire".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["function"], "items");
        assert_eq!(json["method"], "POST");
        assert_eq!(json["path"], "/items");
        assert!(json["message"].as_str().unwrap().contains("caused by"));
    }
}
