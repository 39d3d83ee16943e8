//! The relay hub: who is connected, who is waiting on what, and where each
//! envelope goes.

pub mod correlation;
pub mod expiry;
pub mod registry;
pub mod router;

pub use router::{MessageRouter, RejectReason, RouteOutcome};
