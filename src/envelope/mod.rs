//! Wire codec for the host invocation protocol.

mod input;
mod output;

pub use input::{EnvelopeError, InvokeRequest, TriggerRequest};
pub use output::{InvokeResponse, ReturnValue, TriggerResponse};
