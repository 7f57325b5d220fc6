use stompprims_transport::TransportError;

/// Errors that can occur during frame construction, encoding, or parsing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The command is not part of the protocol.
    #[error("invalid STOMP command {command:?} (valid commands are {})", .valid.join(", "))]
    InvalidCommand {
        command: String,
        valid: &'static [&'static str],
    },

    /// The byte stream does not follow the frame grammar.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A header cannot be represented on the wire.
    #[error("header {0:?} contains a newline or a colon in its key")]
    InvalidHeader(String),

    /// One-shot parse ran out of input before the frame was complete.
    #[error("incomplete frame (consumed {consumed} bytes)")]
    IncompleteFrame { consumed: usize },

    /// One-shot parse found bytes after a complete frame.
    #[error("{remaining} bytes of trailing data after frame")]
    TrailingData { remaining: usize },

    /// The frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The underlying transport failed while reading or writing.
    #[error("frame transport error: {0}")]
    Transport(#[from] TransportError),
}

impl FrameError {
    /// Whether the stream position is lost and the transport must be replaced.
    ///
    /// Misuse errors of the one-shot parser leave the stream untouched.
    pub fn requires_reconnect(&self) -> bool {
        match self {
            FrameError::IncompleteFrame { .. } | FrameError::TrailingData { .. } => false,
            FrameError::InvalidHeader(_) => false,
            _ => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
