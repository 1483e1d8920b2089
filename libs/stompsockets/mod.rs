//! # StompSockets
//!
//! A STOMP 1.2 client over WebSocket (including SockJS raw endpoints) that
//! keeps working while the connection is down.
//!
//! ## Features
//!
//! - **Buffer until connected**: sends and subscriptions issued while
//!   disconnected are flushed in call order right after CONNECTED
//! - **State stream**: any number of listeners receive `true`/`false` on
//!   connect/disconnect
//! - **Single owner**: one session task owns the socket and the queue, so
//!   operations are applied strictly in issue order
//! - **Per-subscription threads**: callbacks for one subscription run
//!   sequentially on a dedicated thread
//! - **Type-state builder**: the endpoint URL is required at compile-time
//! - **No surprises**: the client never reconnects on its own

pub mod traits;
pub mod protocol;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use self::core::{
    builder, client, config, connection_state, endpoint, heartbeat,
    builder::{states, StompClientBuilder},
    client::{Metrics, StompClient},
    config::ClientConfig,
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    heartbeat::HeartbeatConfig,
};
pub(crate) use self::core::{pending, registry, session};

pub use protocol::{StompMessage, SubscriptionId};

// Convenience function
pub use self::core::builder as client_builder;
