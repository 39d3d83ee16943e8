//! # tether-server
//!
//! Axum WebSocket relay for the tether hub.
//!
//! - [`hub`]: connection registry, request correlation and envelope routing
//! - [`websocket`]: per-connection send queue, heartbeat and session loop
//! - [`server`]: listener binding, `/ws` upgrade, `/health` and `/metrics`
//! - [`auth`]: shared-secret check applied to every inbound envelope
//! - [`shutdown`]: cancellation token plus tracked tasks

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod errors;
pub mod health;
pub mod hub;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use auth::{Authenticator, SharedSecret};
pub use config::{ServerConfig, message_router};
pub use errors::ServerError;
pub use hub::{MessageRouter, RejectReason, RouteOutcome};
pub use server::{BoundListener, TetherServer};
pub use shutdown::ShutdownCoordinator;
