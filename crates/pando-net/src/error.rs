//! Network error types

use thiserror::Error;

/// Network errors
#[derive(Debug, Error)]
pub enum NetworkError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire framing or JSON decoding failed
    #[error("codec error: {0}")]
    Codec(String),

    /// Handshake did not follow the version/acknowledge exchange
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Bootstrap entry is not a usable `host:port` pair
    #[error("invalid bootstrap peer: {0}")]
    InvalidBootstrap(String),

    /// Query handler reported an error
    #[error("query handler error: {0}")]
    Handler(String),

    /// Already running
    #[error("network already running")]
    AlreadyRunning,

    /// Channel closed
    #[error("channel closed")]
    ChannelClosed,
}

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;
