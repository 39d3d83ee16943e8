//! Settings types.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TetherSettings {
    /// Listener and connection limits.
    pub server: ServerSettings,
    /// Routing behaviour and credentials.
    pub relay: RelaySettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl TetherSettings {
    /// Reject settings the hub cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.relay.api_key.is_empty() {
            return Err(SettingsError::InvalidValue(
                "relay.apiKey must be set (file, TETHER_API_KEY or --api-key)".into(),
            ));
        }
        if self.server.listeners.is_empty() {
            return Err(SettingsError::InvalidValue(
                "server.listeners must contain at least one listener".into(),
            ));
        }
        for (i, listener) in self.server.listeners.iter().enumerate() {
            if self.server.listeners[..i]
                .iter()
                .any(|l| l.name == listener.name)
            {
                return Err(SettingsError::InvalidValue(format!(
                    "duplicate listener name: {}",
                    listener.name
                )));
            }
        }
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be greater than zero".into(),
            ));
        }
        if self.relay.correlation_ttl_secs.is_some() && self.relay.sweep_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "relay.sweepIntervalSecs must be greater than zero when a TTL is set".into(),
            ));
        }
        Ok(())
    }
}

/// One listening endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerSettings {
    /// Tag recorded as the origin endpoint of accepted connections.
    pub name: String,
    /// Bind address.
    pub host: String,
    /// Bind port (`0` for auto-assign).
    pub port: u16,
}

impl ListenerSettings {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            name: "primary".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3103,
        }
    }
}

/// Transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Listening endpoints. All of them feed the same hub.
    pub listeners: Vec<ListenerSettings>,
    /// Maximum concurrent WebSocket connections across all listeners.
    pub max_connections: usize,
    /// Max WebSocket message size in bytes. A larger frame is a protocol
    /// error: the connection is closed and its pending requests are purged.
    pub max_message_size: usize,
    /// Outbound queue depth per connection.
    pub send_queue_capacity: usize,
    /// Interval between server Ping frames.
    pub heartbeat_interval_secs: u64,
    /// Disconnect a client silent for longer than this.
    pub heartbeat_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listeners: vec![ListenerSettings::default()],
            max_connections: 100,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            send_queue_capacity: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
        }
    }
}

/// Routing settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Shared secret every envelope must carry as `apiKey`.
    pub api_key: String,
    /// Broadcast `{type: "disconnect"}` when a peer leaves.
    pub announce_disconnects: bool,
    /// Evict unanswered requests after this many seconds. `None` keeps them
    /// until the requester disconnects.
    pub correlation_ttl_secs: Option<u64>,
    /// How often the expiry sweep runs when a TTL is set.
    pub sweep_interval_secs: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            announce_disconnects: true,
            correlation_ttl_secs: None,
            sweep_interval_secs: 60,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
