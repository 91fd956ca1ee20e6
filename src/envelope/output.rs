//! Outbound invocation envelope encoding.

use serde::Serialize;
use std::collections::HashMap;

/// Outbound invocation envelope answered to the host.
///
/// Field names are part of the host contract and serialized exactly as
/// the host expects them. `Outputs` is never populated by the bridge
/// and always encodes as `null`.
#[derive(Debug, Serialize)]
pub struct InvokeResponse {
    /// Output bindings. The bridge only produces the HTTP return value,
    /// so this stays `null`.
    #[serde(rename = "Outputs")]
    pub outputs: Option<HashMap<String, serde_json::Value>>,
    /// Formatted log lines captured during the invocation, in emission
    /// order.
    #[serde(rename = "Logs")]
    pub logs: Vec<String>,
    /// The HTTP return value wrapper.
    #[serde(rename = "ReturnValue")]
    pub return_value: ReturnValue,
}

/// Return-value mapping; the HTTP response lives under `res`.
#[derive(Debug, Serialize)]
pub struct ReturnValue {
    pub res: TriggerResponse,
}

/// HTTP response description mirrored from the response recording.
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    /// Final status code of the recorded response.
    #[serde(rename = "StatusCode")]
    pub status_code: u16,
    /// Header multimap of the recorded response.
    #[serde(rename = "Headers")]
    pub headers: HashMap<String, Vec<String>>,
    /// Recorded body as text, omitted when empty.
    #[serde(rename = "Body", skip_serializing_if = "String::is_empty")]
    pub body: String,
}

impl InvokeResponse {
    /// Assemble an envelope from the final response parts and the
    /// captured log lines.
    pub fn new(
        status_code: u16,
        headers: HashMap<String, Vec<String>>,
        body: String,
        logs: Vec<String>,
    ) -> Self {
        Self {
            outputs: None,
            logs,
            return_value: ReturnValue {
                res: TriggerResponse {
                    status_code,
                    headers,
                    body,
                },
            },
        }
    }

    /// Serialize the envelope for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
