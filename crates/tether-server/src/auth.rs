//! Per-message authentication.
//!
//! Every envelope is checked on its own; there is no authenticated session.

use tether_core::Envelope;

/// Decides whether an envelope may be routed.
pub trait Authenticator: Send + Sync {
    /// `true` if the envelope carries valid credentials.
    fn is_authorized(&self, envelope: &Envelope) -> bool;
}

/// Shared-secret check on the envelope's `apiKey` field.
pub struct SharedSecret {
    secret: String,
}

impl SharedSecret {
    /// Accept envelopes whose `apiKey` equals `secret`.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl Authenticator for SharedSecret {
    fn is_authorized(&self, envelope: &Envelope) -> bool {
        if self.secret.is_empty() {
            return false;
        }
        envelope
            .api_key()
            .is_some_and(|key| constant_time_eq(key.as_bytes(), self.secret.as_bytes()))
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret").finish_non_exhaustive()
    }
}

/// Byte comparison whose running time does not depend on where inputs differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
