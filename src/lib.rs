//! # funcbridge - Custom-Handler Invocation Bridge
//!
//! funcbridge runs plain HTTP handlers under a serverless function
//! host. The host does not forward HTTP directly; it wraps every
//! trigger in a JSON invocation envelope and posts it to this process.
//! The bridge unwraps the envelope, synthesizes the original request,
//! runs the registered handler against an in-memory response recording
//! and hands the outcome back as the envelope the host expects,
//! captured per-invocation logs included.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Function Host                         │
//! │        (trigger bindings, scaling, invocation queue)        │
//! └─────────────────────────────────────────────────────────────┘
//!                 │ POST /<functionName>
//!                 │ {"Data":{"req":{...}},"Metadata":{...}}
//!                 ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Bridge Server                         │
//! │    decode envelope → synthesize request → run handler       │
//! │    classify failure → encode recording + captured logs      │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐    │
//! │  │ Handler  │  │ Handler  │  │ Handler  │  │ Handler  │    │
//! │  │  (GET)   │  │  (POST)  │  │  (GET)   │  │   ...    │    │
//! │  └──────────┘  └──────────┘  └──────────┘  └──────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use funcbridge::prelude::*;
//!
//! // Define a handler
//! struct HelloHandler;
//!
//! #[async_trait::async_trait]
//! impl HttpHandler for HelloHandler {
//!     async fn handle(
//!         &self,
//!         res: &mut ResponseRecorder,
//!         req: FunctionRequest,
//!         ctx: &InvocationContext,
//!     ) -> Result<(), HandlerError> {
//!         ctx.logger().info("saying hello");
//!         res.text("Hello from the bridge!");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     // Create the bridge server
//!     let mut server = BridgeServer::with_defaults();
//!
//!     // Register handlers under their function names
//!     server.register_get("hello", HelloHandler);
//!
//!     // Serve until SIGINT/SIGTERM
//!     server.serve().await
//! }
//! ```
//!
//! ## Invocation Flow
//!
//! Each posted envelope goes through the same chain:
//!
//! 1. **Decode**: the envelope and its nested `req` HTTP description
//! 2. **Synthesize**: rebuild the original request, enforce accepted methods
//! 3. **Execute**: run the handler on its own task, bounded by a deadline
//! 4. **Classify**: map any failure to its terminal status and error page
//! 5. **Encode**: serialize the recording and captured logs back to the host
//!
//! ## Failure Classification
//!
//! Handler failures never produce a broken envelope:
//!
//! - Structured 400/401/404 errors render an error page with that status
//! - Canceled invocations and exceeded deadlines render 408
//! - Everything else is logged, reported and rendered as 500; local runs
//!   get the raw diagnostic chain instead of the page
//!
//! The outer host exchange stays 200 throughout; the invocation's real
//! status travels inside the envelope.

pub mod envelope;
pub mod function;
pub mod http;
pub mod logging;
pub mod report;
pub mod runtime;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::function::{HandlerError, HttpError, HttpHandler};
    pub use crate::http::{FunctionRequest, Method, ResponseRecorder, StatusCode};
    pub use crate::logging::{FunctionLogger, LogLevel};
    pub use crate::runtime::{BridgeConfig, BridgeServer, Environment, InvocationContext};
    pub use async_trait::async_trait;
}

// Re-export for convenience
pub use function::{HandlerError, HttpError, HttpHandler};
pub use http::{FunctionRequest, ResponseRecorder};
pub use runtime::{BridgeConfig, BridgeServer};
