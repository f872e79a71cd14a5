//! Ring buffer implementation
//!
//! A fixed-capacity circular byte store keyed by absolute stream offsets,
//! shared between one writer and many cursors.

use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::cursor::ReadCursor;

/// Result of a single non-blocking read attempt
pub(super) enum ReadOutcome {
    /// Bytes starting at the requested offset
    Data(Bytes),
    /// Nothing new yet, the caller should wait for a write
    Empty,
    /// The buffer is closed and the cursor has read everything
    Closed,
    /// The requested offset is no longer retained
    Overrun { oldest_offset: u64 },
}

/// Mutable buffer state, guarded by the mutex in [`Shared`]
///
/// # Invariants
/// - `len <= buf.len()` and `head < buf.len()`.
/// - `start_offset` is the absolute offset of the byte at `head`.
/// - The write offset is `start_offset + len`.
pub(super) struct RingState {
    buf: Vec<u8>,
    head: usize,
    len: usize,
    start_offset: u64,
    closed: bool,
    cursors: usize,
    idle_since: Option<Instant>,
}

impl RingState {
    fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            head: 0,
            len: 0,
            start_offset: 0,
            closed: false,
            cursors: 0,
            idle_since: Some(Instant::now()),
        }
    }

    pub(super) fn start_offset(&self) -> u64 {
        self.start_offset
    }

    pub(super) fn write_offset(&self) -> u64 {
        self.start_offset + self.len as u64
    }

    /// Append bytes, evicting the oldest ones on overflow.
    fn push(&mut self, data: &[u8]) {
        let cap = self.buf.len();
        let n = data.len();

        if n >= cap {
            let old_end = self.write_offset();
            self.buf.copy_from_slice(&data[n - cap..]);
            self.head = 0;
            self.len = cap;
            self.start_offset = old_end + (n - cap) as u64;
            return;
        }

        let overflow = (self.len + n).saturating_sub(cap);
        if overflow > 0 {
            self.head = (self.head + overflow) % cap;
            self.len -= overflow;
            self.start_offset += overflow as u64;
        }

        let tail = (self.head + self.len) % cap;
        let first = (cap - tail).min(n);
        self.buf[tail..tail + first].copy_from_slice(&data[..first]);
        if n > first {
            self.buf[..n - first].copy_from_slice(&data[first..]);
        }
        self.len += n;
    }

    /// Copy up to `max` bytes starting at absolute `offset`.
    pub(super) fn read_at(&self, offset: u64, max: usize) -> ReadOutcome {
        if offset < self.start_offset {
            // Once closed, a lagging cursor just sees end-of-stream
            if self.closed {
                return ReadOutcome::Closed;
            }
            return ReadOutcome::Overrun {
                oldest_offset: self.start_offset,
            };
        }

        let end = self.write_offset();
        if offset >= end {
            return if self.closed {
                ReadOutcome::Closed
            } else {
                ReadOutcome::Empty
            };
        }

        let available = (end - offset) as usize;
        let n = available.min(max);
        let cap = self.buf.len();
        let start = (self.head + (offset - self.start_offset) as usize) % cap;
        let first = (cap - start).min(n);

        let mut out = BytesMut::with_capacity(n);
        out.extend_from_slice(&self.buf[start..start + first]);
        if n > first {
            out.extend_from_slice(&self.buf[..n - first]);
        }
        ReadOutcome::Data(out.freeze())
    }

    pub(super) fn attach(&mut self) {
        self.cursors += 1;
        self.idle_since = None;
    }

    pub(super) fn detach(&mut self) {
        self.cursors = self.cursors.saturating_sub(1);
        if self.cursors == 0 {
            self.idle_since = Some(Instant::now());
        }
    }
}

/// State shared between the buffer handle and its cursors
pub(super) struct Shared {
    pub(super) state: Mutex<RingState>,
    pub(super) notify: Notify,
}

/// Fixed-capacity, single-writer / multi-reader circular byte buffer
///
/// Cloning the handle is cheap and shares the same storage. Only one task
/// should ever call [`write`](Self::write); concurrent producers are not
/// supported.
#[derive(Clone)]
pub struct RingBuffer {
    shared: Arc<Shared>,
}

impl RingBuffer {
    /// Create an empty buffer retaining at most `capacity` bytes.
    ///
    /// # Panics
    /// Panics if `capacity == 0`.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RingState::new(capacity)),
                notify: Notify::new(),
            }),
        }
    }

    /// Append bytes to the buffer and wake every waiting reader.
    ///
    /// Never blocks on readers. Writes after [`close`](Self::close) are dropped.
    pub fn write(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        {
            let mut state = self.shared.state.lock();
            if state.closed {
                tracing::trace!(len = data.len(), "Write after close ignored");
                return;
            }
            state.push(data);
        }

        self.shared.notify.notify_waiters();
    }

    /// Close the buffer.
    ///
    /// Suspended readers wake up; once a cursor has drained what is still
    /// retained it observes end-of-stream.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }

        self.shared.notify.notify_waiters();
    }

    /// Attach a cursor at the oldest retained byte, so the backlog is replayed.
    pub fn new_cursor(&self) -> ReadCursor {
        let offset = {
            let mut state = self.shared.state.lock();
            state.attach();
            state.start_offset()
        };
        ReadCursor::new(Arc::clone(&self.shared), offset)
    }

    /// Attach a cursor at the current write offset, skipping the backlog.
    pub fn live_cursor(&self) -> ReadCursor {
        let offset = {
            let mut state = self.shared.state.lock();
            state.attach();
            state.write_offset()
        };
        ReadCursor::new(Arc::clone(&self.shared), offset)
    }

    /// Maximum number of bytes retained
    pub fn capacity(&self) -> usize {
        self.shared.state.lock().buf.len()
    }

    /// Total bytes ever written
    pub fn write_offset(&self) -> u64 {
        self.shared.state.lock().write_offset()
    }

    /// Absolute offset of the oldest retained byte
    pub fn oldest_offset(&self) -> u64 {
        self.shared.state.lock().start_offset()
    }

    /// Number of bytes currently retained
    pub fn len(&self) -> usize {
        self.shared.state.lock().len
    }

    /// Whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Number of cursors currently attached
    pub fn active_cursors(&self) -> usize {
        self.shared.state.lock().cursors
    }

    /// When the buffer last became idle, or `None` while any cursor is attached.
    ///
    /// The clock starts at creation and restarts whenever the last cursor
    /// detaches or [`touch`](Self::touch) is called.
    pub fn idle_since(&self) -> Option<Instant> {
        self.shared.state.lock().idle_since
    }

    /// Restart the idle clock if no cursor is attached.
    ///
    /// Used when a reader is known to be on its way but has not attached yet.
    pub fn touch(&self) {
        let mut state = self.shared.state.lock();
        if state.cursors == 0 {
            state.idle_since = Some(Instant::now());
        }
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("RingBuffer")
            .field("capacity", &state.buf.len())
            .field("start_offset", &state.start_offset)
            .field("write_offset", &state.write_offset())
            .field("cursors", &state.cursors)
            .field("closed", &state.closed)
            .finish()
    }
}
