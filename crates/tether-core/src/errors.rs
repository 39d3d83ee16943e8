//! Error types for envelope decoding.
//!
//! Decoding failures never tear down a connection. The router turns an
//! [`EnvelopeError`] into an `{error}` reply to the sender and drops the frame.

use thiserror::Error;

/// Why an inbound frame could not be turned into an [`Envelope`].
///
/// [`Envelope`]: crate::envelope::Envelope
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The frame was not valid JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// The frame was valid JSON but not an object.
    #[error("Envelope must be a JSON object, got {kind}")]
    NotAnObject {
        /// JSON type that was received instead (`array`, `string`, ...).
        kind: &'static str,
    },

    /// A binary frame whose payload is not UTF-8 text.
    #[error("Binary frame of {len} bytes is not UTF-8 text")]
    NonUtf8 {
        /// Frame length in bytes.
        len: usize,
    },
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidJson(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_json_display() {
        let err: EnvelopeError = serde_json::from_str::<serde_json::Value>("{bad")
            .unwrap_err()
            .into();
        assert!(err.to_string().starts_with("Invalid JSON: "));
    }

    #[test]
    fn not_an_object_display() {
        let err = EnvelopeError::NotAnObject { kind: "array" };
        assert_eq!(err.to_string(), "Envelope must be a JSON object, got array");
    }

    #[test]
    fn non_utf8_display() {
        let err = EnvelopeError::NonUtf8 { len: 3 };
        assert_eq!(err.to_string(), "Binary frame of 3 bytes is not UTF-8 text");
    }
}
