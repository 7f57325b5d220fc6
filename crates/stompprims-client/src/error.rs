use std::time::Duration;

/// Errors that can occur in client operations.
///
/// Transport and protocol failures inside the engine are recovered by
/// reconnecting and only reach callers through [`handshake`](crate::handshake)
/// when it is used directly.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] stompprims_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] stompprims_frame::FrameError),

    /// The broker answered the handshake with something other than CONNECTED.
    #[error("unexpected frame: {0}")]
    UnexpectedFrame(String),

    /// The protocol feature is intentionally not implemented.
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// `start` was called more than once.
    #[error("connection already started")]
    AlreadyStarted,

    /// The connection has been stopped.
    #[error("connection stopped")]
    Stopped,

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker: {0}")]
    Spawn(std::io::Error),

    /// Waiting timed out.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, ClientError>;
