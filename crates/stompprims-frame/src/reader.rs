use stompprims_transport::Transport;
use tracing::trace;

use crate::codec::{Frame, FrameConfig};
use crate::error::Result;
use crate::parser::{Feed, FrameParser};

/// Reads complete frames from a [`Transport`].
///
/// Bytes are peeked, fed to a fresh [`FrameParser`], and only then consumed
/// from the transport in the amount the parser reports. Bytes belonging to
/// the following frame therefore stay in the transport.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Transport> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next complete frame (blocking).
    ///
    /// A bare `\n` on the wire is returned as a heartbeat frame.
    pub fn read_frame(&self) -> Result<Frame> {
        let mut parser = FrameParser::with_max_frame_size(self.config.max_frame_size);
        loop {
            let chunk = self.inner.peek(self.config.read_chunk_size)?;
            match parser.feed(&chunk)? {
                Feed::Pending { consumed } => {
                    trace!(consumed, "partial frame");
                    self.inner.consume(consumed)?;
                }
                Feed::Complete { frame, consumed } => {
                    self.inner.consume(consumed)?;
                    return Ok(frame);
                }
            }
        }
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
