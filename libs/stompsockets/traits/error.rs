use thiserror::Error;

/// Main error type for stompsockets
#[derive(Error, Debug)]
pub enum StompError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// The broker rejected the CONNECT frame or never answered it properly
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Malformed STOMP frame
    #[error("Frame error: {0}")]
    Frame(String),

    /// Payload could not be serialized / deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}

/// Result type for stompsockets operations
pub type Result<T> = std::result::Result<T, StompError>;
