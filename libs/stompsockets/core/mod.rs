//! # StompSockets core
//!
//! The connection manager and everything it owns:
//!
//! - **client**: `StompClient`, the public handle
//! - **session**: the task that owns the socket and the pending queue
//! - **builder**: type-state builder producing a client
//! - **pending** / **registry**: buffered operations and live subscriptions
//! - **heartbeat** / **endpoint**: negotiation and URL helpers
//!
//! ## Example
//!
//! ```rust,ignore
//! use stompsockets::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = stompsockets::builder()
//!         .url("http://localhost:9000/websocket")
//!         .headers(StaticCredentials::new("guest", "guest"))
//!         .build()
//!         .await?;
//!
//!     let mut states = client.state_changes();
//!     client.send("/app/chat", &"hello")?; // buffered
//!     client.connect().await?;              // flushed here
//!     assert_eq!(states.recv().await.ok(), Some(true));
//!
//!     client.shutdown().await
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod endpoint;
pub mod heartbeat;
pub(crate) mod pending;
pub(crate) mod registry;
pub(crate) mod session;

// Re-export main types
pub use builder::{states, StompClientBuilder};
pub use client::{Metrics, StompClient};
pub use config::ClientConfig;
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use heartbeat::{HeartbeatConfig, Negotiated};

// Re-export traits for convenience
pub use crate::traits::*;

/// Create a new STOMP client builder
///
/// # Example
/// ```ignore
/// let client = stompsockets::builder()
///     .url("https://broker.example.com/ws")
///     .heartbeat(Duration::from_secs(10), Duration::from_secs(10))
///     .build()
///     .await?;
/// ```
pub fn builder() -> StompClientBuilder<builder::states::NoUrl> {
    StompClientBuilder::new()
}
