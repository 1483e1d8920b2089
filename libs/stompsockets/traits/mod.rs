//! # StompSockets Traits
//!
//! Seams the client exposes to applications:
//!
//! - **MessageHandler**: receive MESSAGE frames for a subscription
//! - **HeaderProvider**: contribute headers (credentials) to CONNECT
//! - **StompError**: the error type shared by every layer

pub mod error;
pub mod handler;
pub mod headers;

pub use error::{Result, StompError};
pub use handler::MessageHandler;
pub use headers::{HeaderProvider, Headers, NoHeaders, StaticCredentials};
