//! Statistics for restreams

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::upstream::FetcherState;

/// Live counters updated by a fetcher's background task
#[derive(Debug, Default)]
pub struct StreamCounters {
    bytes_received: AtomicU64,
    chunks_received: AtomicU64,
    connect_attempts: AtomicU64,
    connect_failures: AtomicU64,
    reconnects: AtomicU64,
}

impl StreamCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one chunk of `len` bytes written to the buffer
    pub fn record_chunk(&self, len: usize) {
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
        self.chunks_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection attempt
    pub fn record_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed attempt or a dropped connection
    pub fn record_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful connection after an earlier failure
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Total bytes received so far
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Total connection attempts so far
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }
}

/// Point-in-time statistics for one restream
#[derive(Debug, Clone)]
pub struct StreamStats {
    /// Stream key
    pub stream_key: String,
    /// Lifecycle state
    pub state: FetcherState,
    /// When the restream was created
    pub started_at: Instant,
    /// Total bytes received from upstream
    pub bytes_received: u64,
    /// Number of chunks received from upstream
    pub chunks_received: u64,
    /// Connection attempts, including the first
    pub connect_attempts: u64,
    /// Failed attempts and dropped connections
    pub connect_failures: u64,
    /// Successful connections following a failure
    pub reconnects: u64,
    /// Bytes currently retained in the ring buffer
    pub buffered_bytes: usize,
    /// Ring buffer capacity
    pub buffer_capacity: usize,
    /// Cursors currently attached
    pub active_cursors: usize,
}

impl StreamStats {
    /// Snapshot `counters` together with the fetcher's buffer and state
    pub fn snapshot(
        stream_key: String,
        state: FetcherState,
        started_at: Instant,
        counters: &StreamCounters,
        buffered_bytes: usize,
        buffer_capacity: usize,
        active_cursors: usize,
    ) -> Self {
        Self {
            stream_key,
            state,
            started_at,
            bytes_received: counters.bytes_received.load(Ordering::Relaxed),
            chunks_received: counters.chunks_received.load(Ordering::Relaxed),
            connect_attempts: counters.connect_attempts.load(Ordering::Relaxed),
            connect_failures: counters.connect_failures.load(Ordering::Relaxed),
            reconnects: counters.reconnects.load(Ordering::Relaxed),
            buffered_bytes,
            buffer_capacity,
            active_cursors,
        }
    }

    /// Get duration since the restream started
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Average inbound bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            (self.bytes_received * 8) / secs
        } else {
            0
        }
    }
}
