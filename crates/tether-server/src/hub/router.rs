//! Envelope routing across every connection in the hub.
//!
//! All hub state (registry plus correlation table) sits behind one mutex.
//! [`MessageRouter::route`] holds it for the whole decision and only ever
//! calls non-blocking sends while it does, so concurrent routes from
//! different connections cannot interleave a `put` with a `take_and_clear`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde_json::Value;
use tether_core::{
    ConnectionId, DeliveryMode, Envelope, EnvelopeError, Inbound, KNOWN_ACTIONS, RequestId, classify,
    fields,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::correlation::CorrelationTable;
use super::registry::{ConnectionRegistry, Snapshot};
use crate::auth::Authenticator;
use crate::metrics::{
    RELAY_CORRELATIONS_EXPIRED_TOTAL, RELAY_CORRELATIONS_PENDING, RELAY_ENVELOPES_TOTAL,
    RELAY_REJECTED_TOTAL, RELAY_SEND_FAILURES_TOTAL,
};
use crate::websocket::connection::ClientConnection;

/// Error text sent back when authentication fails.
pub const UNAUTHORIZED_MESSAGE: &str = "Invalid API key";

/// Why an inbound frame was refused.
#[derive(Clone, Debug, PartialEq)]
pub enum RejectReason {
    /// Missing or wrong `apiKey`.
    Unauthorized,
    /// The frame did not decode to a JSON object.
    Malformed(EnvelopeError),
}

impl RejectReason {
    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Malformed(_) => "malformed",
        }
    }

    fn reply(&self) -> Envelope {
        match self {
            Self::Unauthorized => Envelope::error(UNAUTHORIZED_MESSAGE),
            Self::Malformed(e) => Envelope::error(e.to_string()),
        }
    }
}

/// What [`MessageRouter::route`] did with one inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum RouteOutcome {
    /// Authenticated and delivered according to `mode`.
    ///
    /// For queries the mode carries the resolved request id, generated or not.
    Routed {
        /// Delivery mode that applied.
        mode: DeliveryMode,
        /// Recipients whose queue accepted the message.
        delivered: usize,
        /// Recipients whose send failed.
        failed: usize,
    },
    /// Refused; the sender got an error reply.
    Rejected {
        /// Why.
        reason: RejectReason,
    },
    /// The sender is no longer registered; nothing happened.
    UnknownSender,
}

impl RouteOutcome {
    /// Recipients reached, zero unless routed.
    pub fn delivered(&self) -> usize {
        match self {
            Self::Routed { delivered, .. } => *delivered,
            _ => 0,
        }
    }

    /// Delivery mode, if the frame was routed.
    pub fn mode(&self) -> Option<&DeliveryMode> {
        match self {
            Self::Routed { mode, .. } => Some(mode),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Tally {
    delivered: usize,
    failed: usize,
}

#[derive(Default)]
struct HubState {
    registry: ConnectionRegistry,
    correlations: CorrelationTable,
}

/// The hub: connection registry, correlation table and routing rules.
pub struct MessageRouter {
    state: Mutex<HubState>,
    auth: Box<dyn Authenticator>,
    announce_disconnects: bool,
}

impl MessageRouter {
    /// Create a router that checks every envelope with `auth`.
    pub fn new(auth: impl Authenticator + 'static) -> Self {
        Self {
            state: Mutex::new(HubState::default()),
            auth: Box::new(auth),
            announce_disconnects: true,
        }
    }

    /// Whether to broadcast a `disconnect` notice when a peer leaves.
    #[must_use]
    pub fn with_disconnect_notices(mut self, enabled: bool) -> Self {
        self.announce_disconnects = enabled;
        self
    }

    /// Register a newly accepted connection and greet it with its identity.
    pub fn connect(&self, origin: &str, tx: mpsc::Sender<Arc<String>>) -> Arc<ClientConnection> {
        let mut state = self.state.lock();
        let connection = state.registry.register(origin, tx);
        // Queued under the lock so no broadcast can overtake the greeting.
        let welcome = Envelope::welcome(&connection.id);
        let mut tally = Tally::default();
        deliver(&connection, &Arc::new(welcome.to_json()), &mut tally);
        drop(state);
        info!(conn_id = %connection.id, origin, "connection registered");
        connection
    }

    /// Tear down a connection: unregister, purge its pending requests, then
    /// optionally tell everyone else.
    ///
    /// Returns `false` if the connection was already gone; a repeat call has
    /// no further effect.
    pub fn disconnect(&self, id: &ConnectionId) -> bool {
        let mut state = self.state.lock();
        if state.registry.unregister(id).is_none() {
            return false;
        }
        let purged = state.correlations.purge_connection(id);
        set_pending_gauge(&state.correlations);

        let mut tally = Tally::default();
        if self.announce_disconnects {
            let notice = Arc::new(Envelope::disconnect_notice().to_json());
            broadcast_except(state.registry.all_open(), id, &notice, &mut tally);
        }
        drop(state);

        info!(
            conn_id = %id,
            purged,
            notified = tally.delivered,
            "connection unregistered"
        );
        true
    }

    /// Authenticate, classify and deliver one inbound frame from `sender`.
    pub fn route(&self, sender: &ClientConnection, inbound: Inbound) -> RouteOutcome {
        let envelope = match inbound {
            Inbound::Envelope(envelope) => envelope,
            Inbound::Malformed(e) => return reject(sender, RejectReason::Malformed(e)),
        };
        if !self.auth.is_authorized(&envelope) {
            return reject(sender, RejectReason::Unauthorized);
        }

        let mode = classify(&envelope);
        let mut state = self.state.lock();
        if !state.registry.contains(&sender.id) {
            debug!(conn_id = %sender.id, mode = mode.label(), "dropping envelope from unregistered connection");
            return RouteOutcome::UnknownSender;
        }

        let mut tally = Tally::default();
        let mode = match mode {
            DeliveryMode::Targeted { socket_id } => {
                match state.registry.find_by_identity(&socket_id) {
                    Some(target) => deliver(&target, &Arc::new(envelope.to_json()), &mut tally),
                    None => debug!(conn_id = %sender.id, target = %socket_id, "target not connected, dropping"),
                }
                DeliveryMode::Targeted { socket_id }
            }
            DeliveryMode::Query { request_id } => {
                if let Some(action) = envelope.action().filter(|a| !KNOWN_ACTIONS.contains(a)) {
                    debug!(conn_id = %sender.id, action, "routing unrecognized action as query");
                }
                let request_id = request_id.unwrap_or_else(RequestId::generate);
                if let Some(previous) = state
                    .correlations
                    .put(request_id.clone(), sender.id.clone())
                {
                    debug!(%request_id, superseded = %previous, "request id reused");
                }
                let stamped = envelope
                    .with(fields::REQUEST_ID, request_id.as_str().into())
                    .with(fields::SOCKET_ID, sender.id.as_str().into());
                let message = Arc::new(stamped.to_json());
                broadcast_except(state.registry.all_open(), &sender.id, &message, &mut tally);
                DeliveryMode::Query {
                    request_id: Some(request_id),
                }
            }
            DeliveryMode::Response { request_id } => {
                match state.correlations.take_and_clear(&request_id) {
                    Some(requester) => match state.registry.find_by_identity(&requester) {
                        Some(target) => {
                            let reply = envelope.with(fields::IS_FROM_SELF, Value::Bool(true));
                            deliver(&target, &Arc::new(reply.to_json()), &mut tally);
                        }
                        None => debug!(%request_id, %requester, "requester gone, dropping response"),
                    },
                    None => debug!(%request_id, "no pending request, dropping response"),
                }
                DeliveryMode::Response { request_id }
            }
            DeliveryMode::Unsolicited => {
                let echo = envelope
                    .clone()
                    .with(fields::IS_FROM_SELF, Value::Bool(true));
                deliver(sender, &Arc::new(echo.to_json()), &mut tally);
                let message = Arc::new(envelope.to_json());
                broadcast_except(state.registry.all_open(), &sender.id, &message, &mut tally);
                DeliveryMode::Unsolicited
            }
            DeliveryMode::Broadcast => {
                let message = Arc::new(envelope.to_json());
                broadcast_except(state.registry.all_open(), &sender.id, &message, &mut tally);
                DeliveryMode::Broadcast
            }
        };
        set_pending_gauge(&state.correlations);
        drop(state);

        counter!(RELAY_ENVELOPES_TOTAL, "mode" => mode.label()).increment(1);
        debug!(
            conn_id = %sender.id,
            mode = mode.label(),
            delivered = tally.delivered,
            failed = tally.failed,
            "routed envelope"
        );
        RouteOutcome::Routed {
            mode,
            delivered: tally.delivered,
            failed: tally.failed,
        }
    }

    /// Drop pending requests older than `ttl`. Returns how many.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let mut state = self.state.lock();
        let expired = state.correlations.expire_older_than(ttl, Instant::now());
        set_pending_gauge(&state.correlations);
        drop(state);
        if expired > 0 {
            counter!(RELAY_CORRELATIONS_EXPIRED_TOTAL).increment(expired as u64);
            info!(expired, "expired pending requests");
        }
        expired
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.state.lock().registry.len()
    }

    /// Number of outstanding requests.
    pub fn pending_requests(&self) -> usize {
        self.state.lock().correlations.len()
    }
}

fn reject(sender: &ClientConnection, reason: RejectReason) -> RouteOutcome {
    counter!(RELAY_REJECTED_TOTAL, "reason" => reason.label()).increment(1);
    warn!(conn_id = %sender.id, reason = reason.label(), "rejecting inbound frame");
    let mut tally = Tally::default();
    deliver(sender, &Arc::new(reason.reply().to_json()), &mut tally);
    RouteOutcome::Rejected { reason }
}

fn deliver(connection: &ClientConnection, message: &Arc<String>, tally: &mut Tally) {
    match connection.send(Arc::clone(message)) {
        Ok(()) => tally.delivered += 1,
        Err(failure) => {
            tally.failed += 1;
            counter!(RELAY_SEND_FAILURES_TOTAL).increment(1);
            warn!(
                conn_id = %connection.id,
                reason = failure.label(),
                total_drops = connection.drop_count(),
                "failed to deliver envelope"
            );
        }
    }
}

fn broadcast_except(
    recipients: Snapshot,
    sender: &ConnectionId,
    message: &Arc<String>,
    tally: &mut Tally,
) {
    for connection in recipients.filter(|c| &c.id != sender) {
        deliver(&connection, message, tally);
    }
}

#[allow(clippy::cast_precision_loss)]
fn set_pending_gauge(correlations: &CorrelationTable) {
    gauge!(RELAY_CORRELATIONS_PENDING).set(correlations.len() as f64);
}
