//! In-memory response recording for handler execution.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const REQUEST_TIMEOUT: StatusCode = StatusCode(408);
    pub const PAYLOAD_TOO_LARGE: StatusCode = StatusCode(413);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);

    /// Check if the status code indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Check if the status code indicates a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    /// Check if the status code indicates a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }

    /// Canonical reason phrase, empty for codes without one.
    pub fn reason(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            408 => "Request Timeout",
            413 => "Payload Too Large",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "",
        }
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::OK
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> Self {
        code.0
    }
}

/// Response sink handed to handler code.
///
/// Accumulates status, headers and body in memory; nothing is flushed
/// to a network socket. The recorded parts are serialized into the
/// outbound envelope once the invocation settles.
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    status: Option<StatusCode>,
    headers: HashMap<String, Vec<String>>,
    body: Vec<u8>,
}

impl ResponseRecorder {
    /// Create an empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response status. The first explicit write wins; later
    /// writes are ignored.
    pub fn set_status(&mut self, status: impl Into<StatusCode>) {
        let status = status.into();
        if let Some(current) = self.status {
            debug!(current = current.0, ignored = status.0, "duplicate status write ignored");
            return;
        }
        self.status = Some(status);
    }

    /// Effective status of the recording, 200 unless explicitly set.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Set a header, replacing any previous values.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), vec![value.into()]);
    }

    /// Append a header value, keeping previous ones.
    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.entry(key.into()).or_default().push(value.into());
    }

    /// Get the first value of a recorded header.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Append raw bytes to the body.
    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    /// Append text to the body.
    pub fn write_str(&mut self, text: &str) {
        self.body.extend_from_slice(text.as_bytes());
    }

    /// Write a plain-text body.
    pub fn text(&mut self, content: impl AsRef<str>) {
        self.set_header("Content-Type", "text/plain");
        self.write_str(content.as_ref());
    }

    /// Write an HTML body.
    pub fn html(&mut self, content: impl AsRef<str>) {
        self.set_header("Content-Type", "text/html");
        self.write_str(content.as_ref());
    }

    /// Write a JSON body.
    pub fn json<T: Serialize>(&mut self, data: &T) -> Result<(), serde_json::Error> {
        let body = serde_json::to_vec(data)?;
        self.set_header("Content-Type", "application/json");
        self.write(&body);
        Ok(())
    }

    /// Recorded body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Recorded header multimap.
    pub fn headers(&self) -> &HashMap<String, Vec<String>> {
        &self.headers
    }

    /// Discard everything recorded so far, including the status.
    pub(crate) fn reset(&mut self) {
        self.status = None;
        self.headers.clear();
        self.body.clear();
    }

    /// Replace the recording with a plain-text error, the shape the
    /// bridge uses for failures that happen before handler code runs.
    pub(crate) fn plain_error(&mut self, status: StatusCode) {
        self.reset();
        self.set_header("Content-Type", "text/plain; charset=utf-8");
        self.set_header("X-Content-Type-Options", "nosniff");
        self.set_status(status);
        self.write_str(status.reason());
        self.write_str("\n");
    }

    /// Tear the recording into its serializable parts.
    pub(crate) fn into_parts(self) -> (StatusCode, HashMap<String, Vec<String>>, Vec<u8>) {
        (self.status.unwrap_or(StatusCode::OK), self.headers, self.body)
    }
}
