//! Runtime wiring: configuration, invocation context, error pages and
//! the bridge server itself.

mod config;
mod context;
mod render;
mod server;

pub use config::{BridgeConfig, Environment};
pub use context::{ContextError, InvocationContext};
pub use server::{BridgeServer, HostRequest, HostResponse};
