//! Byte-stream transport binding for STOMP clients.
//!
//! The connection engine never touches sockets directly. It talks to a
//! [`Transport`] handle, which supports the four operations the frame reader
//! needs (write, peek, consume, close), and obtains fresh handles from a
//! [`Connector`] every time the link has to be re-established.
//!
//! This is the lowest layer of stompprims. A blocking TCP implementation is
//! provided in [`tcp`].

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::{TcpConnector, TcpTransport};
pub use traits::{Connector, Transport};
