#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use stompprims_frame::{parse_frame, Frame};
use stompprims_transport::{Connector, Result, Transport, TransportError};

/// Frames written by the client, tagged with the 1-based connection number.
pub type Log = Arc<Mutex<Vec<(usize, Frame)>>>;

/// In-memory transport: inbound bytes are scripted, outbound frames are logged.
pub struct MemTransport {
    conn: usize,
    inbound: Mutex<VecDeque<u8>>,
    arrived: Condvar,
    closed: AtomicBool,
    writes_left: Mutex<Option<usize>>,
    log: Log,
}

impl MemTransport {
    pub fn push(&self, bytes: &[u8]) {
        self.inbound.lock().unwrap().extend(bytes.iter().copied());
        self.arrived.notify_all();
    }
}

impl Transport for MemTransport {
    fn write_all(&self, bytes: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Shutdown);
        }
        let mut left = self.writes_left.lock().unwrap();
        if let Some(n) = left.as_mut() {
            if *n == 0 {
                return Err(std::io::Error::from(ErrorKind::BrokenPipe).into());
            }
            *n -= 1;
        }
        let frame = parse_frame(bytes).expect("client wrote an unparseable frame");
        self.log.lock().unwrap().push((self.conn, frame));
        Ok(())
    }

    fn peek(&self, max: usize) -> Result<Vec<u8>> {
        let mut inbound = self.inbound.lock().unwrap();
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Shutdown);
            }
            if !inbound.is_empty() {
                return Ok(inbound.iter().take(max).copied().collect());
            }
            inbound = self.arrived.wait(inbound).unwrap();
        }
    }

    fn consume(&self, n: usize) -> Result<()> {
        self.inbound.lock().unwrap().drain(..n);
        Ok(())
    }

    fn set_read_timeout(&self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }

    fn close(&self) {
        let _guard = self.inbound.lock().unwrap();
        self.closed.store(true, Ordering::SeqCst);
        self.arrived.notify_all();
    }

    fn transport_name(&self) -> &'static str {
        "memory"
    }
}

/// Script for one connection opened by [`MemConnector`].
#[derive(Default, Clone)]
pub struct Script {
    /// Bytes available to read as soon as the transport opens.
    pub inbound: Vec<u8>,
    /// Number of successful writes before every further write fails.
    pub writes: Option<usize>,
}

impl Script {
    pub fn connected(session: &str) -> Self {
        Self {
            inbound: format!("CONNECTED\nsession:{session}\n\n\0").into_bytes(),
            writes: None,
        }
    }

    pub fn then(mut self, bytes: &[u8]) -> Self {
        self.inbound.extend_from_slice(bytes);
        self
    }

    pub fn fail_after(mut self, writes: usize) -> Self {
        self.writes = Some(writes);
        self
    }
}

/// Opens one [`MemTransport`] per call, following the queued scripts.
/// Once the scripts run out every further connection behaves like
/// `Script::connected("extra")`.
#[derive(Clone)]
pub struct MemConnector {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    opened: Arc<AtomicUsize>,
    current: Arc<Mutex<Option<Arc<MemTransport>>>>,
    pub log: Log,
}

impl MemConnector {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into_iter().collect())),
            opened: Arc::new(AtomicUsize::new(0)),
            current: Arc::new(Mutex::new(None)),
            log: Arc::default(),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Deliver bytes on the most recently opened transport.
    pub fn push(&self, bytes: &[u8]) {
        let current = self.current.lock().unwrap().clone();
        current.expect("no transport opened yet").push(bytes);
    }

    pub fn written(&self) -> Vec<(usize, Frame)> {
        self.log.lock().unwrap().clone()
    }
}

impl Connector for MemConnector {
    fn open(&self, _address: &str, _protected: bool) -> Result<Box<dyn Transport>> {
        let conn = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::connected("extra"));
        let transport = Arc::new(MemTransport {
            conn,
            inbound: Mutex::new(script.inbound.into_iter().collect()),
            arrived: Condvar::new(),
            closed: AtomicBool::new(false),
            writes_left: Mutex::new(script.writes),
            log: Arc::clone(&self.log),
        });
        *self.current.lock().unwrap() = Some(Arc::clone(&transport));
        Ok(Box::new(transport))
    }
}

/// Poll `condition` until it holds or five seconds pass.
pub fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}
