//! Handler trait and error types for bridged functions.

use crate::http::{FunctionRequest, ResponseRecorder, StatusCode};
use crate::runtime::InvocationContext;
use async_trait::async_trait;

/// Handler trait for functions served through the bridge.
///
/// A handler receives the response recording to write into, the
/// synthetic request built from the trigger description, and the
/// per-invocation context. Returning an error hands the outcome to the
/// bridge's classifier; the terminal response it renders replaces
/// anything the handler recorded before failing.
#[async_trait]
pub trait HttpHandler: Send + Sync {
    /// Handle one invocation.
    async fn handle(
        &self,
        res: &mut ResponseRecorder,
        req: FunctionRequest,
        ctx: &InvocationContext,
    ) -> Result<(), HandlerError>;
}

/// Structured handler error carrying an explicit HTTP status.
///
/// Statuses 400, 401 and 404 are honored as-is by the classifier;
/// anything else falls through to generic 500 handling.
#[derive(Debug, Clone)]
pub struct HttpError {
    /// Status code to render.
    pub status: StatusCode,
    /// Human-readable reason, logged but never sent to the client.
    pub reason: String,
}

impl HttpError {
    /// Create a structured error with a specific status.
    pub fn new(status: impl Into<StatusCode>, reason: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, reason)
    }

    /// Create an unauthorized error.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, reason)
    }

    /// Create a bad request error.
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, reason)
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.status.0, self.reason)
    }
}

impl std::error::Error for HttpError {}

/// Any failure a handler can return.
#[derive(Debug)]
pub enum HandlerError {
    /// A structured, client-facing failure.
    Http(HttpError),
    /// An opaque failure, classified generically.
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerError::Http(err) => err.fmt(f),
            HandlerError::Other(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandlerError::Http(_) => None,
            HandlerError::Other(err) => err.source(),
        }
    }
}

impl From<HttpError> for HandlerError {
    fn from(err: HttpError) -> Self {
        HandlerError::Http(err)
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        HandlerError::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Other(Box::new(err))
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError::Other(message.into())
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::Other(message.into())
    }
}
