//! Connection engine.
//!
//! Three workers share one [`Shared`] state:
//!
//! - the sender drains the [`OutboundQueue`] onto the current transport,
//! - the receiver parses inbound frames and dispatches them,
//! - the reconnector re-establishes the link whenever it is broken.
//!
//! A fourth, the dispatcher, runs application handlers so that a slow
//! handler never stalls the receiver.
//!
//! Link availability is a single [`LinkState`] guarded by a mutex and a
//! condition variable. Every installed transport gets a new generation
//! number; a worker reporting a failure names the generation it was using, so
//! a stale failure can never tear down a newer link.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use stompprims_frame::{Command, Frame, FrameReader, FrameWriter};
use stompprims_transport::{Connector, Transport};
use tracing::{debug, error, info, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::{ClientError, Result};
use crate::handler::{Handlers, Message};
use crate::handshake::{handshake, HandshakeResult};
use crate::queue::OutboundQueue;

/// How long the sender waits on an empty queue before re-checking for stop.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Availability of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Not started yet.
    Stopped,
    /// No usable transport; the reconnector will try to establish one.
    Broken,
    /// A reconnect attempt is in progress.
    Connecting,
    /// Handshake completed; sender and receiver are running.
    Ready,
    /// `stop` was called; workers are exiting.
    Stopping,
}

pub(crate) enum Delivery {
    Message(Message),
    Error(Frame),
}

struct Link {
    state: LinkState,
    started: bool,
    generation: u64,
    transport: Option<Arc<dyn Transport>>,
    session: Option<String>,
    server_info: Option<String>,
}

impl Link {
    fn teardown(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
        self.session = None;
        self.server_info = None;
    }
}

/// Counters and receipt bookkeeping.
struct Book {
    send_counter: u64,
    subscription_counter: u64,
    pending_receipts: HashSet<String>,
}

pub(crate) struct Shared {
    pub(crate) config: ConnectionConfig,
    pub(crate) queue: OutboundQueue,
    pub(crate) handlers: Handlers,
    connector: Box<dyn Connector>,
    link: Mutex<Link>,
    link_changed: Condvar,
    book: Mutex<Book>,
    receipt_seen: Condvar,
}

impl Shared {
    pub(crate) fn new(config: ConnectionConfig, connector: Box<dyn Connector>) -> Self {
        Self {
            config,
            queue: OutboundQueue::new(),
            handlers: Handlers::default(),
            connector,
            link: Mutex::new(Link {
                state: LinkState::Stopped,
                started: false,
                generation: 0,
                transport: None,
                session: None,
                server_info: None,
            }),
            link_changed: Condvar::new(),
            book: Mutex::new(Book {
                send_counter: 0,
                subscription_counter: 0,
                pending_receipts: HashSet::new(),
            }),
            receipt_seen: Condvar::new(),
        }
    }

    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn book(&self) -> MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- lifecycle ---------------------------------------------------------

    /// Flip STOPPED to BROKEN. Fails if the engine was ever started or stopped.
    pub(crate) fn begin(&self) -> Result<()> {
        let mut link = self.link();
        if link.started || link.state == LinkState::Stopping {
            return Err(ClientError::AlreadyStarted);
        }
        link.started = true;
        link.state = LinkState::Broken;
        self.link_changed.notify_all();
        Ok(())
    }

    pub(crate) fn stop(&self) {
        {
            let mut link = self.link();
            if link.state == LinkState::Stopping {
                return;
            }
            link.state = LinkState::Stopping;
            link.teardown();
        }
        info!(address = %self.config.address, "stopping connection");
        self.link_changed.notify_all();
        // Taking the lock orders this wakeup after any in-flight receipt check.
        drop(self.book());
        self.receipt_seen.notify_all();
        self.queue.wake();
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.link().state == LinkState::Stopping
    }

    /// Whether `generation` is still the READY link.
    fn is_current(&self, generation: u64) -> bool {
        let link = self.link();
        link.state == LinkState::Ready && link.generation == generation
    }

    pub(crate) fn state(&self) -> LinkState {
        self.link().state
    }

    pub(crate) fn session(&self) -> Option<String> {
        self.link().session.clone()
    }

    pub(crate) fn server_info(&self) -> Option<String> {
        self.link().server_info.clone()
    }

    /// Block until READY, STOPPING, or `timeout`.
    pub(crate) fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut link = self.link();
        loop {
            match link.state {
                LinkState::Ready => return Ok(()),
                LinkState::Stopping => return Err(ClientError::Stopped),
                _ => {}
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ClientError::Timeout(timeout));
            }
            link = self
                .link_changed
                .wait_timeout(link, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    // -- link gate ---------------------------------------------------------

    /// Wait for a READY link newer than `after`. `None` once stopping.
    fn wait_ready(&self, after: u64) -> Option<(u64, Arc<dyn Transport>)> {
        let mut link = self.link();
        loop {
            if link.state == LinkState::Stopping {
                return None;
            }
            if link.state == LinkState::Ready && link.generation > after {
                if let Some(transport) = &link.transport {
                    return Some((link.generation, Arc::clone(transport)));
                }
            }
            link = self
                .link_changed
                .wait(link)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wait until the link is BROKEN and claim it for a reconnect attempt.
    /// Returns `false` once stopping.
    fn claim_broken(&self) -> bool {
        let mut link = self.link();
        loop {
            match link.state {
                LinkState::Stopping => return false,
                LinkState::Broken => {
                    link.state = LinkState::Connecting;
                    link.teardown();
                    return true;
                }
                _ => {
                    link = self
                        .link_changed
                        .wait(link)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// Report a failure on the transport of `generation`.
    ///
    /// Ignored when that generation has already been replaced. Closing the
    /// old transport unblocks the other worker if it is still using it.
    fn mark_broken(&self, generation: u64) {
        let mut link = self.link();
        if link.state != LinkState::Ready || link.generation != generation {
            return;
        }
        link.state = LinkState::Broken;
        link.teardown();
        drop(link);
        warn!(address = %self.config.address, generation, "link broken");
        self.link_changed.notify_all();
    }

    fn attempt_failed(&self) {
        let mut link = self.link();
        if link.state == LinkState::Connecting {
            link.state = LinkState::Broken;
        }
    }

    fn install(&self, transport: Arc<dyn Transport>, result: HandshakeResult) {
        let mut link = self.link();
        if link.state != LinkState::Connecting {
            transport.close();
            return;
        }
        link.generation += 1;
        link.transport = Some(transport);
        link.session = result.session;
        link.server_info = result.server_info;
        link.state = LinkState::Ready;
        info!(
            address = %self.config.address,
            generation = link.generation,
            session = ?link.session,
            "connected"
        );
        drop(link);
        self.link_changed.notify_all();
    }

    /// Sleep for `delay` unless stop is requested first.
    fn pause(&self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        let deadline = Instant::now() + delay;
        let mut link = self.link();
        while link.state != LinkState::Stopping {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            link = self
                .link_changed
                .wait_timeout(link, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    // -- bookkeeping -------------------------------------------------------

    /// Allocate the next send id and record it as awaiting a receipt.
    pub(crate) fn next_receipt(&self) -> u64 {
        let mut book = self.book();
        let id = book.send_counter;
        book.send_counter += 1;
        book.pending_receipts.insert(id.to_string());
        id
    }

    pub(crate) fn next_subscription(&self) -> u64 {
        let mut book = self.book();
        book.subscription_counter += 1;
        book.subscription_counter
    }

    pub(crate) fn pending_receipts(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.book().pending_receipts.iter().cloned().collect();
        ids.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => a.cmp(b),
        });
        ids
    }

    fn confirm_receipt(&self, id: &str) {
        let removed = self.book().pending_receipts.remove(id);
        if removed {
            debug!(receipt = id, "receipt confirmed");
            self.receipt_seen.notify_all();
        } else {
            debug!(receipt = id, "receipt for unknown id");
        }
    }

    /// Block until receipt `id` is confirmed, the engine stops, or `timeout`.
    pub(crate) fn wait_receipt(&self, id: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut book = self.book();
        loop {
            if !book.pending_receipts.contains(id) {
                return Ok(());
            }
            if self.is_stopping() {
                return Err(ClientError::Stopped);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ClientError::Timeout(timeout));
            }
            book = self
                .receipt_seen
                .wait_timeout(book, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    // -- dispatch ----------------------------------------------------------

    fn dispatch(&self, frame: Frame, deliveries: &mpsc::Sender<Delivery>) {
        match frame.command {
            Command::Heartbeat => trace!("heartbeat received"),
            Command::Message => {
                if let Some(ack) = ack_for(&frame) {
                    self.queue.put(ack);
                }
                let _ = deliveries.send(Delivery::Message(Message::from_frame(frame)));
            }
            Command::Receipt => {
                if let Some(id) = frame.header("receipt-id") {
                    self.confirm_receipt(id);
                }
            }
            Command::Error => {
                warn!(message = ?frame.header("message"), "broker sent ERROR frame");
                let _ = deliveries.send(Delivery::Error(frame));
            }
            other => debug!(command = %other, "ignoring unexpected frame"),
        }
    }
}

/// Build the automatic ACK for a MESSAGE carrying an `ack` header.
fn ack_for(message: &Frame) -> Option<Frame> {
    let ack_id = message.header("ack")?;
    let mut ack = Frame::bare(Command::Ack).with_header("id", ack_id);
    if let Some(message_id) = message.header("message-id") {
        ack.headers.insert("message-id", message_id);
    }
    if let Some(subscription) = message.header("subscription") {
        ack.headers.insert("subscription", subscription);
    }
    Some(ack)
}

// -- workers ---------------------------------------------------------------

pub(crate) fn run_sender(shared: Arc<Shared>) {
    let mut seen = 0;
    'link: while let Some((generation, transport)) = shared.wait_ready(seen) {
        let mut writer = FrameWriter::new(transport);
        loop {
            if !shared.is_current(generation) {
                seen = generation;
                continue 'link;
            }
            let Some(frame) = shared.queue.peek_front_timeout(IDLE_POLL) else {
                continue;
            };
            match writer.write_frame(&frame) {
                Ok(()) => {
                    shared.queue.remove_front();
                    debug!(command = %frame.command, receipt = ?frame.header("receipt"), "frame sent");
                }
                Err(err) if err.requires_reconnect() => {
                    if !shared.is_stopping() {
                        warn!(%err, generation, "send failed; frame kept for retry");
                    }
                    shared.mark_broken(generation);
                    seen = generation;
                    continue 'link;
                }
                Err(err) => {
                    error!(%err, command = %frame.command, "dropping frame that cannot be encoded");
                    shared.queue.remove_front();
                }
            }
        }
    }
    debug!("sender exiting");
}

pub(crate) fn run_receiver(shared: Arc<Shared>, deliveries: mpsc::Sender<Delivery>) {
    let mut seen = 0;
    'link: while let Some((generation, transport)) = shared.wait_ready(seen) {
        let reader = FrameReader::with_config(transport, shared.config.frame.clone());
        while !shared.is_stopping() {
            match reader.read_frame() {
                Ok(frame) => {
                    debug!(command = %frame.command, "frame received");
                    shared.dispatch(frame, &deliveries);
                }
                Err(err) => {
                    if !shared.is_stopping() {
                        warn!(%err, generation, "receive failed");
                    }
                    shared.mark_broken(generation);
                    seen = generation;
                    continue 'link;
                }
            }
        }
        break;
    }
    debug!("receiver exiting");
}

pub(crate) fn run_reconnector(shared: Arc<Shared>) {
    let mut failures = 0u32;
    while shared.claim_broken() {
        let config = &shared.config;
        let attempt = shared
            .connector
            .open(&config.address, config.protected)
            .map_err(ClientError::from)
            .and_then(|transport| {
                let transport: Arc<dyn Transport> = Arc::from(transport);
                match handshake(&*transport, config) {
                    Ok(result) => Ok((transport, result)),
                    Err(err) => {
                        transport.close();
                        Err(err)
                    }
                }
            });

        match attempt {
            Ok((transport, result)) => {
                failures = 0;
                shared.install(transport, result);
            }
            Err(err) => {
                failures = failures.saturating_add(1);
                let delay = config.reconnect.delay_for(failures);
                warn!(address = %config.address, attempt = failures, ?delay, %err, "reconnect failed");
                shared.attempt_failed();
                shared.pause(delay);
            }
        }
    }
    debug!("reconnector exiting");
}

pub(crate) fn run_dispatcher(shared: Arc<Shared>, deliveries: mpsc::Receiver<Delivery>) {
    for delivery in deliveries {
        let outcome = match delivery {
            Delivery::Message(message) => match shared.handlers.message() {
                Some(handler) => catch_unwind(AssertUnwindSafe(|| handler(&message))),
                None => Ok(()),
            },
            Delivery::Error(frame) => match shared.handlers.error() {
                Some(handler) => catch_unwind(AssertUnwindSafe(|| handler(&frame))),
                None => Ok(()),
            },
        };
        if outcome.is_err() {
            error!("handler panicked");
        }
    }
    debug!("dispatcher exiting");
}
