//! Inbound invocation envelope decoding.
//!
//! The host delivers each unit of work as a JSON envelope whose `Data`
//! mapping carries the logical trigger parameters. HTTP-triggered work
//! arrives under the `req` key as a nested HTTP description. The two
//! layers are decoded separately so a missing `req` and a malformed one
//! stay distinct failures.

use serde::Deserialize;
use serde_json::value::RawValue;
use std::collections::HashMap;

/// Inbound invocation envelope as posted by the host.
///
/// `Data` values are kept raw so that only the entries the bridge
/// understands are ever parsed.
#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    /// Logical parameter name to raw JSON payload.
    #[serde(rename = "Data", default)]
    pub data: HashMap<String, Box<RawValue>>,
    /// Trigger metadata supplied by the host. Unused by the bridge but
    /// tolerated so envelopes from any host version decode.
    #[serde(rename = "Metadata", default)]
    pub metadata: HashMap<String, Box<RawValue>>,
}

impl InvokeRequest {
    /// Decode an envelope from the raw bytes of the host request body.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(EnvelopeError::Decode)
    }

    /// Extract the raw `req` payload carrying the HTTP description.
    pub fn trigger_payload(&self) -> Result<&RawValue, EnvelopeError> {
        self.data
            .get("req")
            .map(|raw| raw.as_ref())
            .ok_or(EnvelopeError::MissingField("req"))
    }
}

/// Nested HTTP description the host embeds under `Data.req`.
///
/// Every field is optional on the wire; absent fields decode to their
/// empty value, mirroring the host's permissive encoding.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerRequest {
    /// Target URL of the original request.
    #[serde(rename = "Url", default)]
    pub url: String,
    /// HTTP method as sent by the original client.
    #[serde(rename = "Method", default)]
    pub method: String,
    /// Header multimap of the original request.
    #[serde(rename = "Headers", default)]
    pub headers: HashMap<String, Vec<String>>,
    /// Request body as text.
    #[serde(rename = "Body", default)]
    pub body: String,
}

impl TriggerRequest {
    /// Decode an HTTP description from the raw `req` payload.
    pub fn from_raw(raw: &RawValue) -> Result<Self, EnvelopeError> {
        serde_json::from_str(raw.get()).map_err(EnvelopeError::Decode)
    }
}

/// Failure while decoding an inbound envelope.
#[derive(Debug)]
pub enum EnvelopeError {
    /// The envelope or the nested HTTP description is not valid JSON
    /// for the expected shape.
    Decode(serde_json::Error),
    /// A required envelope field is absent.
    MissingField(&'static str),
}

impl std::fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvelopeError::Decode(_) => write!(f, "cannot decode payload"),
            EnvelopeError::MissingField(field) => write!(f, "missing {} parameter", field),
        }
    }
}

impl std::error::Error for EnvelopeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EnvelopeError::Decode(err) => Some(err),
            EnvelopeError::MissingField(_) => None,
        }
    }
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(err: serde_json::Error) -> Self {
        EnvelopeError::Decode(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_envelope() {
        let raw = r#"{
            "Data": {
                "req": {
                    "Url": "http://localhost/api/items",
                    "Method": "GET",
                    "Headers": {"Accept": ["application/json"]},
                    "Body": ""
                }
            },
            "Metadata": {"sys": {"MethodName": "items"}}
        }"#;

        let envelope = InvokeRequest::decode(raw.as_bytes()).unwrap();
        let trigger = TriggerRequest::from_raw(envelope.trigger_payload().unwrap()).unwrap();

        assert_eq!(trigger.url, "http://localhost/api/items");
        assert_eq!(trigger.method, "GET");
        assert_eq!(
            trigger.headers.get("Accept"),
            Some(&vec!["application/json".to_string()])
        );
        assert_eq!(trigger.body, "");
    }

    #[test]
    fn test_decode_missing_req() {
        let envelope = InvokeRequest::decode(br#"{"Data": {}, "Metadata": {}}"#).unwrap();
        let err = envelope.trigger_payload().unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingField("req")));
    }

    #[test]
    fn test_decode_missing_data_defaults_to_empty() {
        let envelope = InvokeRequest::decode(br#"{}"#).unwrap();
        assert!(envelope.data.is_empty());
        assert!(envelope.metadata.is_empty());
        assert!(envelope.trigger_payload().is_err());
    }

    #[test]
    fn test_decode_malformed_envelope() {
        let err = InvokeRequest::decode(b"not json").unwrap_err();
        assert!(matches!(err, EnvelopeError::Decode(_)));
    }

    #[test]
    fn test_decode_malformed_trigger() {
        let envelope =
            InvokeRequest::decode(br#"{"Data": {"req": {"Headers": "wrong"}}}"#).unwrap();
        let raw = envelope.trigger_payload().unwrap();
        assert!(matches!(
            TriggerRequest::from_raw(raw),
            Err(EnvelopeError::Decode(_))
        ));
    }

    #[test]
    fn test_trigger_defaults() {
        let envelope = InvokeRequest::decode(br#"{"Data": {"req": {}}}"#).unwrap();
        let trigger = TriggerRequest::from_raw(envelope.trigger_payload().unwrap()).unwrap();
        assert_eq!(trigger.url, "");
        assert_eq!(trigger.method, "");
        assert!(trigger.headers.is_empty());
        assert_eq!(trigger.body, "");
    }

    #[test]
    fn test_trigger_payload_is_verbatim() {
        let envelope =
            InvokeRequest::decode(br#"{"Data": {"req": {"Method": "GET"}, "extra": [1, 2]}}"#)
                .unwrap();
        assert_eq!(
            envelope.trigger_payload().unwrap().get(),
            r#"{"Method": "GET"}"#
        );
    }
}
