pub mod states;

use crate::client::StompClient;
use crate::config::ClientConfig;
use crate::endpoint;
use crate::heartbeat::HeartbeatConfig;
use crate::traits::*;
use states::*;
use std::sync::Arc;
use std::time::Duration;

/// Default capacity of the connection-state broadcast channel
const DEFAULT_STATE_CHANNEL_CAPACITY: usize = 16;

/// Type-state builder for StompClient
///
/// The endpoint URL is required and enforced by the type system;
/// everything else has a default.
pub struct StompClientBuilder<U>
where
    U: UrlState,
{
    _state: TypeState<U>,
    url: Option<String>,
    sockjs: bool,
    host: Option<String>,
    headers: Option<Arc<dyn HeaderProvider>>,
    heartbeat: HeartbeatConfig,
    state_channel_capacity: usize,
}

impl StompClientBuilder<NoUrl> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            url: None,
            sockjs: true,
            host: None,
            headers: None,
            heartbeat: HeartbeatConfig::default(),
            state_channel_capacity: DEFAULT_STATE_CHANNEL_CAPACITY,
        }
    }

    /// Broker endpoint (http, https, ws or wss)
    pub fn url(self, url: impl Into<String>) -> StompClientBuilder<HasUrl> {
        StompClientBuilder {
            _state: TypeState::new(),
            url: Some(url.into()),
            sockjs: self.sockjs,
            host: self.host,
            headers: self.headers,
            heartbeat: self.heartbeat,
            state_channel_capacity: self.state_channel_capacity,
        }
    }
}

impl Default for StompClientBuilder<NoUrl> {
    fn default() -> Self {
        Self::new()
    }
}

// Optional configuration methods
impl<U> StompClientBuilder<U>
where
    U: UrlState,
{
    /// Dial `<url>/websocket`, the raw WebSocket endpoint of a SockJS server
    ///
    /// Enabled by default. Disable when the URL already points at a plain
    /// STOMP-over-WebSocket endpoint.
    pub fn sockjs(mut self, enabled: bool) -> Self {
        self.sockjs = enabled;
        self
    }

    /// STOMP virtual host (defaults to the URL host)
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Extra CONNECT headers, e.g. `StaticCredentials`
    pub fn headers(mut self, provider: impl HeaderProvider + 'static) -> Self {
        self.headers = Some(Arc::new(provider));
        self
    }

    /// Heart-beat periods to request; `Duration::ZERO` disables a direction
    pub fn heartbeat(mut self, outgoing: Duration, incoming: Duration) -> Self {
        self.heartbeat = HeartbeatConfig::new(outgoing, incoming);
        self
    }

    /// Number of state events a slow listener may lag behind
    pub fn state_channel_capacity(mut self, capacity: usize) -> Self {
        self.state_channel_capacity = capacity;
        self
    }
}

// Build method - only available when the URL is set
impl StompClientBuilder<HasUrl> {
    /// Validate the configuration and spawn the session task
    ///
    /// Must be called inside a tokio runtime. Does not connect.
    pub async fn build(self) -> Result<StompClient> {
        let raw_url = self
            .url
            .ok_or_else(|| StompError::Configuration("URL must be set".into()))?;
        let url = endpoint::resolve_ws_url(&raw_url, self.sockjs)?;

        if self.state_channel_capacity == 0 {
            return Err(StompError::Configuration(
                "state_channel_capacity must be greater than 0".into(),
            ));
        }

        let host = match self.host {
            Some(host) => host,
            None => endpoint::host_of(&url)
                .map(str::to_string)
                .ok_or_else(|| StompError::Configuration(format!("URL has no host: '{}'", url)))?,
        };

        let config = ClientConfig {
            url,
            host,
            headers: self.headers,
            heartbeat: self.heartbeat,
            state_channel_capacity: self.state_channel_capacity,
        };

        Ok(StompClient::new(config))
    }
}
