use crate::heartbeat::HeartbeatConfig;
use crate::traits::*;
use std::sync::Arc;

/// Configuration for a StompClient
///
/// Built by `StompClientBuilder`; the URL has already been resolved to the
/// WebSocket endpoint that will be dialed.
pub struct ClientConfig {
    /// WebSocket URL (ws:// or wss://)
    pub(crate) url: String,

    /// STOMP `host` header (virtual host)
    pub(crate) host: String,

    /// Optional provider of extra CONNECT headers
    pub(crate) headers: Option<Arc<dyn HeaderProvider>>,

    /// Heart-beat periods requested in CONNECT
    pub(crate) heartbeat: HeartbeatConfig,

    /// Capacity of the connection-state broadcast channel
    pub(crate) state_channel_capacity: usize,
}

impl ClientConfig {
    /// Get a reference to the URL
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn heartbeat(&self) -> HeartbeatConfig {
        self.heartbeat
    }
}
