//! Outbound frame queue.
//!
//! Frames stay at the head of the queue until the sender confirms they were
//! written, so a failed write is retried with the same frame after the link
//! is restored.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use stompprims_frame::Frame;

/// Unbounded FIFO of frames awaiting transmission.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    items: Mutex<VecDeque<Frame>>,
    available: Condvar,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame. Never blocks on the consumer.
    pub fn put(&self, frame: Frame) {
        self.lock().push_back(frame);
        self.available.notify_all();
    }

    /// Return a copy of the oldest frame, blocking while the queue is empty.
    pub fn peek_front(&self) -> Frame {
        let mut items = self.lock();
        loop {
            if let Some(frame) = items.front() {
                return frame.clone();
            }
            items = self
                .available
                .wait(items)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`peek_front`](Self::peek_front) but gives up after `timeout`.
    ///
    /// Also returns `None` early when [`wake`](Self::wake) is called on an
    /// empty queue.
    pub fn peek_front_timeout(&self, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        let mut items = self.lock();
        if let Some(frame) = items.front() {
            return Some(frame.clone());
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        items = self
            .available
            .wait_timeout(items, remaining)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
        items.front().cloned()
    }

    /// Remove the head frame after it has been transmitted.
    pub fn remove_front(&self) -> Option<Frame> {
        self.lock().pop_front()
    }

    /// Wake a consumer blocked in [`peek_front_timeout`](Self::peek_front_timeout).
    pub fn wake(&self) {
        self.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Frame>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
