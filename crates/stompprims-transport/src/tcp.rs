use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Connector, Transport};

/// Scratch size used when discarding consumed bytes.
const DISCARD_CHUNK_SIZE: usize = 4 * 1024;

/// Blocking TCP transport.
///
/// `peek` maps to `MSG_PEEK` on the socket, so bytes that belong to the next
/// frame stay in the kernel buffer until they are explicitly consumed.
pub struct TcpTransport {
    stream: TcpStream,
    closed: AtomicBool,
}

impl TcpTransport {
    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream,
            closed: AtomicBool::new(false),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &TcpStream {
        &self.stream
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        Ok(())
    }

    fn closed_error(&self) -> TransportError {
        if self.closed.load(Ordering::Acquire) {
            TransportError::Shutdown
        } else {
            TransportError::Closed
        }
    }
}

impl Transport for TcpTransport {
    fn write_all(&self, bytes: &[u8]) -> Result<()> {
        self.check_open()?;
        let mut stream = &self.stream;
        stream.write_all(bytes)?;
        stream.flush()?;
        Ok(())
    }

    fn peek(&self, max: usize) -> Result<Vec<u8>> {
        self.check_open()?;
        let mut buf = vec![0u8; max.max(1)];
        loop {
            match self.stream.peek(&mut buf) {
                Ok(0) => return Err(self.closed_error()),
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    if self.closed.load(Ordering::Acquire) {
                        return Err(TransportError::Shutdown);
                    }
                    return Err(TransportError::Io(err));
                }
            }
        }
    }

    fn consume(&self, n: usize) -> Result<()> {
        self.check_open()?;
        let mut stream = &self.stream;
        let mut scratch = [0u8; DISCARD_CHUNK_SIZE];
        let mut remaining = n;
        while remaining > 0 {
            let want = remaining.min(scratch.len());
            match stream.read(&mut scratch[..want]) {
                Ok(0) => return Err(self.closed_error()),
                Ok(read) => remaining -= read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout).map_err(Into::into)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(peer = ?self.stream.peer_addr().ok(), "closing tcp transport");
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }

    fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("peer", &self.stream.peer_addr().ok())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Plaintext TCP connector.
///
/// Refuses `protected` connections with
/// [`TransportError::EncryptionUnavailable`]; callers that need encryption
/// supply their own [`Connector`].
#[derive(Debug, Clone)]
pub struct TcpConnector {
    /// Per-address connect timeout. `None` uses the OS default.
    pub connect_timeout: Option<Duration>,
    /// Disable Nagle's algorithm on new streams.
    pub nodelay: bool,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(5)),
            nodelay: true,
        }
    }
}

impl TcpConnector {
    /// Connect to `address` and return the concrete transport.
    pub fn connect(&self, address: &str) -> Result<TcpTransport> {
        let addrs = address
            .to_socket_addrs()
            .map_err(|source| TransportError::Connect {
                address: address.to_string(),
                source,
            })?;

        let mut last_err = None;
        for addr in addrs {
            let attempt = match self.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    stream.set_nodelay(self.nodelay)?;
                    debug!(%address, %addr, "connected tcp transport");
                    return Ok(TcpTransport::from_stream(stream));
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(TransportError::Connect {
            address: address.to_string(),
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(ErrorKind::AddrNotAvailable, "address resolved to nothing")
            }),
        })
    }
}

impl Connector for TcpConnector {
    fn open(&self, address: &str, protected: bool) -> Result<Box<dyn Transport>> {
        if protected {
            return Err(TransportError::EncryptionUnavailable {
                address: address.to_string(),
            });
        }
        Ok(Box::new(self.connect(address)?))
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;

    fn pair() -> (TcpTransport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = std::thread::spawn(move || listener.accept().unwrap().0);
        let client = TcpConnector::default().connect(&addr).unwrap();
        let server = handle.join().unwrap();
        (client, server)
    }

    #[test]
    fn peek_does_not_consume() {
        let (client, mut server) = pair();
        server.write_all(b"hello").unwrap();

        let first = wait_for_peek(&client, 5);
        let second = client.peek(16).unwrap();
        assert_eq!(first, b"hello");
        assert_eq!(second, b"hello");
    }

    #[test]
    fn consume_discards_exactly_n_bytes() {
        let (client, mut server) = pair();
        server.write_all(b"abcdef").unwrap();

        wait_for_peek(&client, 6);
        client.consume(4).unwrap();
        assert_eq!(client.peek(16).unwrap(), b"ef");
    }

    #[test]
    fn write_all_reaches_peer() {
        let (client, mut server) = pair();
        client.write_all(b"SEND\n\n\0").unwrap();

        let mut buf = [0u8; 7];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"SEND\n\n\0");
    }

    #[test]
    fn peer_close_reports_closed() {
        let (client, server) = pair();
        drop(server);
        let err = client.peek(16).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn local_close_unblocks_peek() {
        let (client, _server) = pair();
        let client = std::sync::Arc::new(client);
        let reader = {
            let client = std::sync::Arc::clone(&client);
            std::thread::spawn(move || client.peek(16))
        };

        std::thread::sleep(Duration::from_millis(50));
        client.close();

        let result = reader.join().unwrap();
        assert!(matches!(result, Err(TransportError::Shutdown)));
        assert!(matches!(client.write_all(b"x"), Err(TransportError::Shutdown)));
    }

    #[test]
    fn read_timeout_surfaces_io_error() {
        let (client, _server) = pair();
        client
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let err = client.peek(16).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Io(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
        ));
    }

    #[test]
    fn protected_connections_are_refused() {
        let err = TcpConnector::default()
            .open("127.0.0.1:61613", true)
            .err()
            .expect("protected open should fail");
        assert!(matches!(err, TransportError::EncryptionUnavailable { .. }));
    }

    #[test]
    fn connect_failure_carries_address() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = TcpConnector::default().connect(&addr).unwrap_err();
        assert!(matches!(err, TransportError::Connect { address, .. } if address == addr));
    }

    fn wait_for_peek(client: &TcpTransport, expected: usize) -> Vec<u8> {
        loop {
            let bytes = client.peek(64).unwrap();
            if bytes.len() >= expected {
                return bytes;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}
