//! The envelope: one decoded JSON object exchanged over a connection.
//!
//! Envelopes have no fixed schema. The router only looks at a handful of
//! recognized keys (see [`fields`]) and otherwise forwards the object as-is,
//! so the wrapper keeps the raw `serde_json::Map` and exposes typed accessors
//! for the keys that drive routing.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::EnvelopeError;
use crate::ids::ConnectionId;

/// Recognized envelope keys.
pub mod fields {
    /// Shared-secret credential.
    pub const API_KEY: &str = "apiKey";
    /// Request intent (`getSerialData`, `getCurrentTheme`, ...).
    pub const ACTION: &str = "action";
    /// Correlates a request with its response.
    pub const REQUEST_ID: &str = "requestId";
    /// Explicit recipient identity.
    pub const SOCKET_ID: &str = "socketId";
    /// Device payload.
    pub const SERIAL_DATA: &str = "serialData";
    /// Captured-frame payload.
    pub const SCREENSHOT_DATA: &str = "screenshotData";
    /// Set on envelopes delivered back to the connection that caused them.
    pub const IS_FROM_SELF: &str = "isFromSelf";
    /// Error description in rejection replies.
    pub const ERROR: &str = "error";
    /// Hub-originated notice kind.
    pub const TYPE: &str = "type";
    /// ISO-8601 timestamp on hub-originated notices.
    pub const TIMESTAMP: &str = "timestamp";
}

/// Actions the front-ends and controllers are known to send.
///
/// Any non-empty `action` is routed as a query; this list only feeds logging.
pub const KNOWN_ACTIONS: &[&str] = &["getSerialData", "getCurrentTheme", "getCurrentApp"];

/// Current UTC time as an ISO-8601 string with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A decoded JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(Map<String, Value>);

impl Envelope {
    /// Accept a JSON value, rejecting anything that is not an object.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(EnvelopeError::NotAnObject { kind: "null" }),
            Value::Bool(_) => Err(EnvelopeError::NotAnObject { kind: "boolean" }),
            Value::Number(_) => Err(EnvelopeError::NotAnObject { kind: "number" }),
            Value::String(_) => Err(EnvelopeError::NotAnObject { kind: "string" }),
            Value::Array(_) => Err(EnvelopeError::NotAnObject { kind: "array" }),
        }
    }

    /// Parse JSON text into an envelope.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Rejection reply: `{error: message}`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::default().with(fields::ERROR, Value::String(message.into()))
    }

    /// Peer-departure notice: `{type: "disconnect", timestamp}`.
    pub fn disconnect_notice() -> Self {
        Self::default()
            .with(fields::TYPE, "disconnect".into())
            .with(fields::TIMESTAMP, timestamp().into())
    }

    /// Greeting sent to a freshly accepted connection so it learns its identity.
    pub fn welcome(identity: &ConnectionId) -> Self {
        Self::default()
            .with(fields::TYPE, "connected".into())
            .with(fields::SOCKET_ID, identity.as_str().into())
            .with(fields::TIMESTAMP, timestamp().into())
    }

    /// Raw value for a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the key exists at all (a `null` value counts as present).
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    fn non_empty_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The `apiKey` field, when it is a string.
    pub fn api_key(&self) -> Option<&str> {
        self.0.get(fields::API_KEY).and_then(Value::as_str)
    }

    /// The `action` field, when it is a non-empty string.
    pub fn action(&self) -> Option<&str> {
        self.non_empty_str(fields::ACTION)
    }

    /// The `requestId` field, when it is a non-empty string.
    pub fn request_id(&self) -> Option<&str> {
        self.non_empty_str(fields::REQUEST_ID)
    }

    /// The `socketId` field, when it is a non-empty string.
    pub fn socket_id(&self) -> Option<&str> {
        self.non_empty_str(fields::SOCKET_ID)
    }

    /// Whether the envelope carries `serialData` or `screenshotData`.
    pub fn has_payload(&self) -> bool {
        self.contains(fields::SERIAL_DATA) || self.contains(fields::SCREENSHOT_DATA)
    }

    /// Set a key, returning the previous value.
    pub fn insert(&mut self, key: &str, value: Value) -> Option<Value> {
        self.0.insert(key.to_owned(), value)
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: &str, value: Value) -> Self {
        let _ = self.insert(key, value);
        self
    }

    /// Serialize to compact JSON text.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize envelope");
            String::new()
        })
    }
}

/// One inbound frame after the decode step.
///
/// The transport hands every frame to the router in this form, so a decode
/// failure is an ordinary input rather than an error path.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// Successfully decoded object.
    Envelope(Envelope),
    /// The frame could not be decoded.
    Malformed(EnvelopeError),
}

impl Inbound {
    /// Decode a text frame.
    pub fn decode_text(text: &str) -> Self {
        match Envelope::parse(text) {
            Ok(envelope) => Self::Envelope(envelope),
            Err(e) => Self::Malformed(e),
        }
    }

    /// Decode a binary frame. UTF-8 payloads are treated like text frames.
    pub fn decode_binary(data: &[u8]) -> Self {
        match std::str::from_utf8(data) {
            Ok(text) => Self::decode_text(text),
            Err(_) => Self::Malformed(EnvelopeError::NonUtf8 { len: data.len() }),
        }
    }
}

impl From<Envelope> for Inbound {
    fn from(envelope: Envelope) -> Self {
        Self::Envelope(envelope)
    }
}
