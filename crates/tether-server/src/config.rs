//! Server configuration derived from [`TetherSettings`].

use std::time::Duration;

use tether_settings::{ListenerSettings, RelaySettings, TetherSettings};

use crate::auth::SharedSecret;
use crate::hub::MessageRouter;
use crate::websocket::session::SessionConfig;

/// Runtime configuration for the relay server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Endpoints to bind; all of them feed the same hub.
    pub listeners: Vec<ListenerSettings>,
    /// Upgrades beyond this many live connections get `503`.
    pub max_connections: usize,
    /// Max WebSocket message size in bytes. A larger frame is a protocol
    /// error: the connection is closed and its pending requests are purged.
    pub max_message_size: usize,
    /// Outbound queue depth per connection.
    pub send_queue_capacity: usize,
    /// Interval between Ping frames.
    pub heartbeat_interval: Duration,
    /// Silence after which a client is dropped.
    pub heartbeat_timeout: Duration,
    /// Age after which unanswered requests are dropped, if set.
    pub correlation_ttl: Option<Duration>,
    /// How often the expiry task runs.
    pub sweep_interval: Duration,
}

impl ServerConfig {
    /// Build from loaded settings. Zero intervals are raised to one second.
    pub fn from_settings(settings: &TetherSettings) -> Self {
        let server = &settings.server;
        let relay = &settings.relay;
        Self {
            listeners: server.listeners.clone(),
            max_connections: server.max_connections,
            max_message_size: server.max_message_size,
            send_queue_capacity: server.send_queue_capacity.max(1),
            heartbeat_interval: Duration::from_secs(server.heartbeat_interval_secs.max(1)),
            heartbeat_timeout: Duration::from_secs(server.heartbeat_timeout_secs),
            correlation_ttl: relay.correlation_ttl_secs.map(Duration::from_secs),
            sweep_interval: Duration::from_secs(relay.sweep_interval_secs.max(1)),
        }
    }

    /// Per-session limits.
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            send_queue_capacity: self.send_queue_capacity,
            ping_interval: self.heartbeat_interval,
            pong_timeout: self.heartbeat_timeout,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&TetherSettings::default())
    }
}

/// Build the hub's router from the relay settings.
pub fn message_router(relay: &RelaySettings) -> MessageRouter {
    MessageRouter::new(SharedSecret::new(relay.api_key.clone()))
        .with_disconnect_notices(relay.announce_disconnects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_settings() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listeners.len(), 1);
        assert_eq!(cfg.listeners[0].port, 3103);
        assert_eq!(cfg.max_connections, 100);
        assert_eq!(cfg.max_message_size, 16 * 1024 * 1024);
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(cfg.heartbeat_timeout, Duration::from_secs(90));
        assert_eq!(cfg.correlation_ttl, None);
    }

    #[test]
    fn ttl_is_carried_over() {
        let mut settings = TetherSettings::default();
        settings.relay.correlation_ttl_secs = Some(45);
        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.correlation_ttl, Some(Duration::from_secs(45)));
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let mut settings = TetherSettings::default();
        settings.server.heartbeat_interval_secs = 0;
        settings.relay.sweep_interval_secs = 0;
        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(1));
        assert_eq!(cfg.sweep_interval, Duration::from_secs(1));
    }

    #[test]
    fn session_limits() {
        let cfg = ServerConfig::default();
        let session = cfg.session();
        assert_eq!(session.send_queue_capacity, 256);
        assert_eq!(session.ping_interval, cfg.heartbeat_interval);
        assert_eq!(session.pong_timeout, cfg.heartbeat_timeout);
    }

    #[test]
    fn message_router_uses_api_key() {
        let mut settings = TetherSettings::default();
        settings.relay.api_key = "k".into();
        let router = message_router(&settings.relay);
        assert_eq!(router.connection_count(), 0);
    }
}
