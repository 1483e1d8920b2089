//! Minimal STOMP 1.2 wire protocol
//!
//! Only what a publishing/subscribing client needs: frame codec, the
//! client-side command constructors, and the inbound MESSAGE view handed to
//! subscription callbacks.

pub mod frame;
pub mod message;

pub use frame::{decode, Command, Frame, ACCEPT_VERSION, HEARTBEAT};
pub use message::{StompMessage, SubscriptionId};
