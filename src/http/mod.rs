//! Synthetic HTTP types used to run handler code without a socket.

mod recorder;
mod request;

pub use recorder::{ResponseRecorder, StatusCode};
pub use request::{FunctionRequest, Method, SynthesisError};
