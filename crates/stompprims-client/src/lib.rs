//! Self-healing STOMP client connection.
//!
//! A [`Connection`] owns an [`OutboundQueue`] and four worker threads:
//! a sender, a receiver, a reconnector and a dispatcher for application
//! callbacks. Transport failures never reach callers; the link is marked
//! broken and re-established in the background, and queued frames are
//! retried on the new link.

pub mod config;
pub mod connection;
pub mod connector;
mod engine;
pub mod error;
pub mod handler;
pub mod handshake;
pub mod queue;

pub use config::{ConnectionConfig, ReconnectPolicy};
pub use connection::Connection;
pub use connector::{connect, connect_with_connector};
pub use engine::LinkState;
pub use error::{ClientError, Result};
pub use handler::{ErrorHandler, Message, MessageHandler};
pub use handshake::{connect_frame, handshake, HandshakeResult};
pub use queue::OutboundQueue;
