use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// A connected, bidirectional byte stream to a broker.
///
/// All methods take `&self` so that one sending thread and one receiving
/// thread can share a handle. Implementations must tolerate `close` being
/// called concurrently with a blocked `peek` and must make that `peek` return.
pub trait Transport: Send + Sync {
    /// Write every byte of `bytes`, blocking until done.
    fn write_all(&self, bytes: &[u8]) -> Result<()>;

    /// Return up to `max` bytes that are available without removing them.
    ///
    /// Blocks until at least one byte is available. Returns
    /// [`TransportError::Closed`](crate::TransportError::Closed) at end of stream,
    /// never an empty buffer.
    fn peek(&self, max: usize) -> Result<Vec<u8>>;

    /// Discard `n` bytes previously observed through [`peek`](Transport::peek).
    fn consume(&self, n: usize) -> Result<()>;

    /// Apply a read timeout to subsequent `peek` calls. `None` blocks forever.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Shut the stream down in both directions. Idempotent.
    fn close(&self);

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

/// Opens transports to a broker address.
///
/// The engine calls [`open`](Connector::open) once per reconnect attempt and
/// owns the returned handle exclusively.
pub trait Connector: Send + Sync {
    /// Open a new transport. `protected` requests an encrypted stream; a
    /// connector that cannot encrypt must fail rather than fall back to plaintext.
    fn open(&self, address: &str, protected: bool) -> Result<Box<dyn Transport>>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn write_all(&self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn peek(&self, max: usize) -> Result<Vec<u8>> {
        (**self).peek(max)
    }

    fn consume(&self, n: usize) -> Result<()> {
        (**self).consume(n)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn close(&self) {
        (**self).close()
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn write_all(&self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn peek(&self, max: usize) -> Result<Vec<u8>> {
        (**self).peek(max)
    }

    fn consume(&self, n: usize) -> Result<()> {
        (**self).consume(n)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn close(&self) {
        (**self).close()
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}
