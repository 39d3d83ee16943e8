//! # tether-core
//!
//! Shared vocabulary for the tether relay hub:
//!
//! - [`Envelope`]: a decoded JSON object with typed accessors for routing keys
//! - [`Inbound`]: the result of decoding one frame (envelope or malformed)
//! - [`classify`]: precedence-ordered mapping from envelope to [`DeliveryMode`]
//! - [`ConnectionId`] / [`RequestId`]: branded id newtypes
//! - [`logging`]: `tracing` subscriber bootstrap

#![deny(unsafe_code)]

pub mod classify;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod logging;

pub use classify::{DeliveryMode, classify};
pub use envelope::{Envelope, Inbound, KNOWN_ACTIONS, fields, timestamp};
pub use errors::EnvelopeError;
pub use ids::{ConnectionId, RequestId};
