//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tether_core::Inbound;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use crate::hub::{MessageRouter, RouteOutcome};
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Per-connection transport limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Outbound queue depth before sends start failing.
    pub send_queue_capacity: usize,
    /// Interval between server-initiated Ping frames.
    pub ping_interval: Duration,
    /// Silence after which the client is considered dead.
    pub pong_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_queue_capacity: 256,
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(90),
        }
    }
}

/// Whether a client that missed the last ping cycle has been silent too long.
fn is_unresponsive(connection: &ClientConnection, timeout: Duration) -> bool {
    !connection.check_alive() && connection.last_seen_elapsed() > timeout
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection (the router queues a `connected` greeting)
/// 2. Hands every inbound frame to the router, in arrival order
/// 3. Forwards queued outbound messages to the socket
/// 4. Sends periodic Ping frames and drops unresponsive clients
/// 5. Tears down through the router's disconnect hook
#[instrument(skip_all, fields(origin = %origin))]
pub async fn run_ws_session(
    ws: WebSocket,
    origin: Arc<str>,
    router: Arc<MessageRouter>,
    config: SessionConfig,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.send_queue_capacity);
    let connection = router.connect(&origin, send_tx);
    let conn_id = connection.id.clone();

    counter!(WS_CONNECTIONS_TOTAL, "listener" => origin.to_string()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Outbound forwarder with periodic Ping frames.
    let outbound_conn = Arc::clone(&connection);
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(config.ping_interval);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(String::clone(&text).into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if is_unresponsive(&outbound_conn, config.pong_timeout) {
                        warn!(conn_id = %outbound_conn.id, "client unresponsive for {:?}, disconnecting", config.pong_timeout);
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = shutdown.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            _ = &mut outbound => break,
        };
        let msg = match frame {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                warn!(conn_id = %conn_id, error = %e, "websocket read failed, closing");
                break;
            }
            None => break,
        };
        connection.mark_alive();

        let inbound = match msg {
            Message::Text(text) => Inbound::decode_text(text.as_str()),
            Message::Binary(data) => Inbound::decode_binary(&data),
            Message::Close(_) => {
                info!(conn_id = %conn_id, "client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if router.route(&connection, inbound) == RouteOutcome::UnknownSender {
            debug!(conn_id = %conn_id, "connection no longer registered, closing");
            break;
        }
    }

    outbound.abort();
    let _ = router.disconnect(&conn_id);

    info!(conn_id = %conn_id, dropped = connection.drop_count(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL, "listener" => origin.to_string()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
}

#[cfg(test)]
mod tests {
    // Full sessions need a real socket and are covered by tests/integration.rs.
    use super::*;
    use tether_core::ConnectionId;

    fn make_connection() -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(4);
        (ClientConnection::new(ConnectionId::from("c1"), "primary", tx), rx)
    }

    #[test]
    fn default_limits() {
        let config = SessionConfig::default();
        assert_eq!(config.send_queue_capacity, 256);
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.pong_timeout, Duration::from_secs(90));
    }

    #[test]
    fn fresh_connection_is_responsive() {
        let (conn, _rx) = make_connection();
        assert!(!is_unresponsive(&conn, Duration::ZERO));
    }

    #[test]
    fn silent_connection_is_unresponsive_after_timeout() {
        let (conn, _rx) = make_connection();
        assert!(conn.check_alive());
        std::thread::sleep(Duration::from_millis(5));
        assert!(is_unresponsive(&conn, Duration::from_millis(1)));
    }

    #[test]
    fn missed_cycle_within_timeout_is_tolerated() {
        let (conn, _rx) = make_connection();
        assert!(conn.check_alive());
        assert!(!is_unresponsive(&conn, Duration::from_secs(60)));
    }

    #[test]
    fn activity_resets_liveness() {
        let (conn, _rx) = make_connection();
        assert!(conn.check_alive());
        std::thread::sleep(Duration::from_millis(5));
        conn.mark_alive();
        assert!(!is_unresponsive(&conn, Duration::from_millis(1)));
    }
}
