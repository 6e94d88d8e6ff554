//! The wire format: a single, symmetric JSON frame exchanged in both
//! directions over a WebSocket connection.
//!
//! A [`Frame`] carries a required `url`, a `method` defaulting to `GET`
//! on the way in, an optional correlation `id`, and an arbitrary JSON
//! `data` payload. The presence of `id` is the sole distinction between
//! a request (expects a response) and a fire-and-forget send, broadcast,
//! or topic event.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The four verbs a frame's `method` may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Default for Method {
    /// Inbound frames default to `GET` when the field is absent.
    fn default() -> Self {
        Method::Get
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("unknown method: {other}")),
        }
    }
}

/// The single message shape exchanged on a WebSocket connection.
///
/// Unknown extra keys in the wire JSON are ignored by `serde` by
/// default (we don't `deny_unknown_fields`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// An application path, e.g. `/api/items/42`. May include a query string.
    ///
    /// Defaults to empty on deserialization so a missing `url` is a
    /// distinct, recoverable validation failure rather than a JSON
    /// parse error.
    #[serde(default)]
    pub url: String,

    /// The request verb. Defaults to GET on deserialization.
    #[serde(default)]
    pub method: Method,

    /// Correlation identifier. Present on a request and its response;
    /// absent on broadcasts, events, and fire-and-forget sends.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,

    /// Arbitrary JSON payload.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,
}

impl Frame {
    /// Build a request frame with a fresh correlation id.
    #[must_use]
    pub fn request(method: Method, url: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            url: url.into(),
            method,
            id: Some(uuid::Uuid::new_v4().to_string()),
            data,
        }
    }

    /// Build a fire-and-forget frame: no correlation id.
    #[must_use]
    pub fn send(method: Method, url: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            url: url.into(),
            method,
            id: None,
            data,
        }
    }

    /// Build a response frame echoing the request's `url` and `id`.
    #[must_use]
    pub fn response(url: impl Into<String>, id: Option<String>, data: Option<Value>) -> Self {
        Self {
            url: url.into(),
            method: Method::Post,
            id,
            data,
        }
    }

    /// Build an error response, `data = {"error": message}`.
    #[must_use]
    pub fn error_response(url: impl Into<String>, id: Option<String>, message: impl Into<String>) -> Self {
        Self::response(
            url,
            id,
            Some(serde_json::json!({ "error": message.into() })),
        )
    }

    /// Build the protocol-level `/error` frame for a malformed inbound message.
    #[must_use]
    pub fn protocol_error(message: impl Into<String>, id: Option<String>) -> Self {
        Self::error_response("/error", id, message)
    }

    /// Build a broadcast/event frame: `method` defaults to POST, no id.
    #[must_use]
    pub fn broadcast(url: impl Into<String>, data: Option<Value>, method: Option<Method>) -> Self {
        Self {
            url: url.into(),
            method: method.unwrap_or(Method::Post),
            id: None,
            data,
        }
    }

    /// Serialize to a JSON string for the wire.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse an inbound JSON text frame.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Does this frame expect a correlated response?
    #[must_use]
    pub fn is_request(&self) -> bool {
        self.id.is_some()
    }
}
