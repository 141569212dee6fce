use thiserror::Error;

/// Errors raised inside a call bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A socket on either side was closed or broken.
    #[error("transport error: {0}")]
    Transport(String),

    /// A message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// The realtime backend refused the connection.
    #[error("realtime handshake failed: {0}")]
    Handshake(String),

    /// An external collaborator (persistence, telephony control, messaging) failed.
    #[error("collaborator error: {0}")]
    Collaborator(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The session was already torn down.
    #[error("session closed")]
    Closed,
}
