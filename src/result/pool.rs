//! Pooled message buffers
//!
//! Results borrow their buffers from a shared pool and hand them back on
//! disposal. Counters make double releases observable in tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::message::Message;

/// Shared pool of `Vec<Message>` buffers
#[derive(Debug)]
pub struct MessagePool {
    free: Mutex<Vec<Vec<Message>>>,
    max_idle: usize,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl MessagePool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_idle,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn shared(max_idle: usize) -> Arc<Self> {
        Arc::new(Self::new(max_idle))
    }

    /// Take an empty buffer with room for at least `capacity` messages
    pub fn acquire(&self, capacity: usize) -> Vec<Message> {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        let mut buffer = self.free.lock().pop().unwrap_or_default();
        buffer.reserve(capacity);
        buffer
    }

    /// Return a buffer; it is cleared and kept if the pool has room
    pub fn release(&self, mut buffer: Vec<Message>) {
        self.released.fetch_add(1, Ordering::Relaxed);
        buffer.clear();
        let mut free = self.free.lock();
        if free.len() < self.max_idle {
            free.push(buffer);
        }
    }

    /// Buffers waiting for reuse
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::Relaxed)
    }

    /// Buffers currently held by live results
    pub fn outstanding(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }
}

impl Default for MessagePool {
    fn default() -> Self {
        Self::new(64)
    }
}
