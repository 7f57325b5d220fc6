//! The public connection handle.

use std::fmt;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use stompprims_frame::{Command, Frame, Headers};
use stompprims_transport::{Connector, TcpConnector};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::engine::{self, LinkState, Shared};
use crate::error::{ClientError, Result};
use crate::handler::Message;

/// A self-healing connection to a STOMP broker.
///
/// Nothing touches the network until [`start`](Self::start). After that the
/// connection keeps reconnecting in the background until [`stop`](Self::stop)
/// is called or the handle is dropped. Frames enqueued while the link is down
/// are held and transmitted once it is restored.
///
/// ```no_run
/// use stompprims_client::{Connection, ConnectionConfig};
///
/// let config = ConnectionConfig::new("localhost:61613")
///     .with_credentials("guest", "guest")
///     .with_protected(false);
/// let conn = Connection::new(config);
/// conn.on_message(|msg| println!("{}: {:?}", msg.destination, msg.body));
/// conn.start()?;
/// conn.subscribe("/queue/orders");
/// conn.send("/queue/orders", "hello");
/// # Ok::<(), stompprims_client::ClientError>(())
/// ```
pub struct Connection {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Connection {
    /// Connection over plain TCP.
    ///
    /// [`TcpConnector`] cannot encrypt and refuses `protected` connections,
    /// and [`ConnectionConfig`] requests protection by default. Call
    /// `with_protected(false)` on the config, or use
    /// [`with_connector`](Self::with_connector) with an encrypting connector.
    /// Otherwise the connection never becomes READY and keeps retrying.
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_connector(config, TcpConnector::default())
    }

    /// Connection whose transports are opened by `connector`.
    pub fn with_connector(config: ConnectionConfig, connector: impl Connector + 'static) -> Self {
        Self {
            shared: Arc::new(Shared::new(config, Box::new(connector))),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Register the callback for received MESSAGE frames, replacing any
    /// previous one.
    pub fn on_message(&self, handler: impl Fn(&Message) + Send + Sync + 'static) {
        self.shared.handlers.set_message(Arc::new(handler));
    }

    /// Register the callback for received ERROR frames.
    pub fn on_error(&self, handler: impl Fn(&Frame) + Send + Sync + 'static) {
        self.shared.handlers.set_error(Arc::new(handler));
    }

    /// Spawn the workers and begin connecting.
    ///
    /// Returns immediately; use [`wait_ready`](Self::wait_ready) to block until
    /// the first handshake completes. Fails with
    /// [`ClientError::AlreadyStarted`] on every call after the first.
    pub fn start(&self) -> Result<()> {
        self.shared.begin()?;
        info!(address = %self.shared.config.address, "starting connection");

        let (deliveries, inbox) = mpsc::channel();
        let spawned = self.spawn("stomp-dispatch", {
            let shared = Arc::clone(&self.shared);
            move || engine::run_dispatcher(shared, inbox)
        })
        .and_then(|()| {
            self.spawn("stomp-recv", {
                let shared = Arc::clone(&self.shared);
                move || engine::run_receiver(shared, deliveries)
            })
        })
        .and_then(|()| {
            self.spawn("stomp-send", {
                let shared = Arc::clone(&self.shared);
                move || engine::run_sender(shared)
            })
        })
        .and_then(|()| {
            self.spawn("stomp-reconnect", {
                let shared = Arc::clone(&self.shared);
                move || engine::run_reconnector(shared)
            })
        });

        if spawned.is_err() {
            self.shared.stop();
        }
        spawned
    }

    fn spawn(&self, name: &str, work: impl FnOnce() + Send + 'static) -> Result<()> {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(work)
            .map_err(ClientError::Spawn)?;
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        Ok(())
    }

    /// Ask the workers to exit and close the active transport.
    ///
    /// Does not wait; call [`join`](Self::join) for that. Frames still queued
    /// are discarded with the connection.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Wait for all workers to exit. Only meaningful after [`stop`](Self::stop).
    pub fn join(&self) {
        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let current = thread::current().id();
        for handle in handles {
            // A handler calling join from the dispatch thread must not wait on itself.
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
        debug!(address = %self.shared.config.address, "connection workers joined");
    }

    pub fn state(&self) -> LinkState {
        self.shared.state()
    }

    /// Block until the link is READY.
    ///
    /// Fails with [`ClientError::Timeout`] after `timeout`, or
    /// [`ClientError::Stopped`] if the connection is stopping.
    pub fn wait_ready(&self, timeout: Duration) -> Result<()> {
        self.shared.wait_until_ready(timeout)
    }

    /// Session id from the last CONNECTED frame, if the link is up.
    pub fn session(&self) -> Option<String> {
        self.shared.session()
    }

    /// Broker `server` header from the last CONNECTED frame.
    pub fn server_info(&self) -> Option<String> {
        self.shared.server_info()
    }

    /// Send ids still awaiting a RECEIPT, in allocation order.
    pub fn pending_receipts(&self) -> Vec<String> {
        self.shared.pending_receipts()
    }

    /// Number of frames waiting to be transmitted.
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    /// Enqueue a SEND frame for `destination`. Returns the receipt id.
    pub fn send(&self, destination: &str, body: impl Into<Bytes>) -> u64 {
        self.send_with_headers(destination, body, Headers::new())
    }

    /// Like [`send`](Self::send) with extra headers merged into the frame.
    ///
    /// Extra headers are applied last and can override `destination` or
    /// `receipt`.
    pub fn send_with_headers(
        &self,
        destination: &str,
        body: impl Into<Bytes>,
        extra: Headers,
    ) -> u64 {
        let id = self.shared.next_receipt();
        let mut frame = Frame::bare(Command::Send)
            .with_header("destination", destination)
            .with_header("receipt", id.to_string())
            .with_body(body);
        frame.headers.extend(extra.iter());
        frame.ensure_content_length();
        debug!(destination, receipt = id, "send enqueued");
        self.shared.queue.put(frame);
        id
    }

    /// Enqueue an auto-acknowledged SUBSCRIBE. Returns the subscription id.
    pub fn subscribe(&self, destination: &str) -> u64 {
        let id = self.shared.next_subscription();
        let frame = Frame::bare(Command::Subscribe)
            .with_header("subscription", destination)
            .with_header("id", id.to_string())
            .with_header("ack", "auto");
        debug!(destination, subscription = id, "subscribe enqueued");
        self.shared.queue.put(frame);
        id
    }

    /// Enqueue DISCONNECT and wait up to `timeout` for the broker's receipt.
    ///
    /// The link is left as is; call [`stop`](Self::stop) afterwards to tear
    /// the connection down.
    pub fn disconnect(&self, timeout: Duration) -> Result<()> {
        let id = self.shared.next_receipt().to_string();
        let frame = Frame::bare(Command::Disconnect).with_header("receipt", id.as_str());
        info!(address = %self.shared.config.address, receipt = %id, "disconnecting");
        self.shared.queue.put(frame);
        self.shared.wait_receipt(&id, timeout)
    }

    /// Enqueue `frame` untouched.
    ///
    /// No receipt or subscription bookkeeping is done, so frames sent this
    /// way can leave the broker and the local counters out of step.
    pub fn send_frame(&self, frame: Frame) {
        debug!(command = %frame.command, "raw frame enqueued");
        self.shared.queue.put(frame);
    }

    pub fn unsubscribe(&self, _subscription: u64) -> Result<()> {
        Err(ClientError::NotSupported(
            "unsubscribe: subscriptions live for the whole connection",
        ))
    }

    pub fn begin(&self, _transaction: &str) -> Result<()> {
        Err(ClientError::NotSupported("begin: transactions are not implemented"))
    }

    pub fn commit(&self, _transaction: &str) -> Result<()> {
        Err(ClientError::NotSupported("commit: transactions are not implemented"))
    }

    pub fn abort(&self, _transaction: &str) -> Result<()> {
        Err(ClientError::NotSupported("abort: transactions are not implemented"))
    }

    pub fn ack(&self, _message_id: &str) -> Result<()> {
        Err(ClientError::NotSupported(
            "ack: subscriptions are auto-acknowledged",
        ))
    }

    pub fn nack(&self, _message_id: &str) -> Result<()> {
        Err(ClientError::NotSupported(
            "nack: subscriptions are auto-acknowledged",
        ))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .field("queued", &self.queued())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.stop();
    }
}
