//! Synthetic HTTP request built from the host's trigger description.

use crate::envelope::TriggerRequest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP method enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    /// Parse a method token. Matching is exact: methods are
    /// case-sensitive on the wire, so `get` is a valid token but not a
    /// known method.
    pub fn parse(token: &str) -> Option<Method> {
        match token {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "DELETE" => Some(Method::Delete),
            "PATCH" => Some(Method::Patch),
            "HEAD" => Some(Method::Head),
            "OPTIONS" => Some(Method::Options),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Delete => write!(f, "DELETE"),
            Method::Patch => write!(f, "PATCH"),
            Method::Head => write!(f, "HEAD"),
            Method::Options => write!(f, "OPTIONS"),
        }
    }
}

/// Failure while synthesizing a request from a trigger description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// The method is not a valid HTTP token; no request can be built
    /// from the description at all.
    InvalidMethod(String),
    /// The method is well-formed but not accepted by the endpoint.
    MethodNotAllowed(String),
}

impl std::fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SynthesisError::InvalidMethod(token) => {
                write!(f, "invalid method token {:?}", token)
            }
            SynthesisError::MethodNotAllowed(token) => {
                write!(f, "method {} not allowed", token)
            }
        }
    }
}

impl std::error::Error for SynthesisError {}

/// Synthetic request handed to handler code.
///
/// Built once per invocation from the decoded trigger description and
/// never shared across invocations.
#[derive(Debug, Clone)]
pub struct FunctionRequest {
    /// HTTP method.
    pub method: Method,
    /// Request URL as sent by the original client.
    pub url: String,
    /// HTTP header multimap.
    pub headers: HashMap<String, Vec<String>>,
    /// Request body as text.
    pub body: String,
}

impl FunctionRequest {
    /// Build the synthetic request from a trigger description,
    /// enforcing the endpoint's accepted method set.
    ///
    /// An empty method defaults to GET, matching what the original
    /// client library would have sent. A method outside `allowed` skips
    /// handler execution with a 405; a token that is not even a valid
    /// method is a request-construction failure.
    pub fn synthesize(
        trigger: TriggerRequest,
        allowed: &[Method],
    ) -> Result<FunctionRequest, SynthesisError> {
        let method = if trigger.method.is_empty() {
            Method::Get
        } else if !is_valid_method_token(&trigger.method) {
            return Err(SynthesisError::InvalidMethod(trigger.method));
        } else {
            match Method::parse(&trigger.method) {
                Some(method) => method,
                None => return Err(SynthesisError::MethodNotAllowed(trigger.method)),
            }
        };

        if !allowed.contains(&method) {
            return Err(SynthesisError::MethodNotAllowed(method.to_string()));
        }

        Ok(FunctionRequest {
            method,
            url: trigger.url,
            headers: trigger.headers,
            body: trigger.body,
        })
    }

    /// Get the first value of a header.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Get all values of a header.
    pub fn header_values(&self, key: &str) -> &[String] {
        self.headers.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Get the body as text.
    pub fn text(&self) -> &str {
        &self.body
    }

    /// Parse the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Check a method token against the RFC 7230 `tchar` grammar.
fn is_valid_method_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(is_tchar)
}

fn is_tchar(c: u8) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}
