//! Upstream fetcher
//!
//! Owns the single upstream connection for one stream key and keeps that
//! stream's ring buffer filled from a background task.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::buffer::{ReadCursor, RingBuffer};
use crate::descriptor::StreamDescriptor;
use crate::paths::LocalPaths;
use crate::registry::StreamKey;
use crate::stats::{StreamCounters, StreamStats};

use super::backoff::backoff_delay;
use super::client::{HttpUpstreamClient, UpstreamClient};
use super::config::FetcherConfig;
use super::error::UpstreamError;
use super::state::FetcherState;

/// A restream is an upstream fetcher seen from the registry's side
pub type Restream<C = HttpUpstreamClient> = UpstreamFetcher<C>;

/// How a connection that did open came to an end
struct Disconnect {
    error: UpstreamError,
    /// Whether any bytes arrived before the connection ended
    delivered: bool,
}

/// One upstream connection feeding one ring buffer
pub struct UpstreamFetcher<C: UpstreamClient = HttpUpstreamClient> {
    key: StreamKey,
    upstream_url: Url,
    local_paths: LocalPaths,
    buffer: RingBuffer,
    client: Arc<C>,
    config: FetcherConfig,
    state: watch::Sender<FetcherState>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    counters: StreamCounters,
    created_at: Instant,
}

impl<C: UpstreamClient> UpstreamFetcher<C> {
    /// Create a fetcher in the `Created` state. Nothing is fetched until
    /// [`start`](Self::start) is called.
    pub fn new(
        key: StreamKey,
        upstream_url: Url,
        local_paths: LocalPaths,
        client: Arc<C>,
        config: FetcherConfig,
    ) -> Self {
        let (state, _) = watch::channel(FetcherState::Created);

        Self {
            key,
            upstream_url,
            local_paths,
            buffer: RingBuffer::with_capacity(config.buffer_capacity.max(1)),
            client,
            config,
            state,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
            counters: StreamCounters::new(),
            created_at: Instant::now(),
        }
    }

    /// Spawn the background fetch loop.
    ///
    /// Does not wait for the upstream connection. Calling it again, or after
    /// the fetcher was closed, does nothing.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() || self.is_closed() {
            return;
        }

        let fetcher = Arc::clone(self);
        *task = Some(tokio::spawn(async move { fetcher.run().await }));
    }

    /// Rewrite `descriptor` to point at this restream's local paths.
    ///
    /// A player holding the descriptor is expected to attach soon, so the
    /// buffer's idle clock restarts.
    pub fn rewrite(&self, descriptor: &mut StreamDescriptor) {
        descriptor.point_at_restream(&self.local_paths);
        self.buffer.touch();
    }

    /// Attach a new cursor that replays the retained backlog
    pub fn subscribe(&self) -> ReadCursor {
        let cursor = self.buffer.new_cursor();
        tracing::debug!(
            stream = %self.key,
            offset = cursor.offset(),
            cursors = self.buffer.active_cursors(),
            "Cursor attached"
        );
        cursor
    }

    /// Close the restream.
    ///
    /// Cancels the upstream read, wakes every waiting cursor with
    /// end-of-stream and moves to `Closed`. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
        self.finish();
    }

    /// Close and wait for the background task to exit
    pub async fn shutdown(&self) {
        self.close();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(stream = %self.key, error = %e, "Fetch task failed");
            }
        }
    }

    /// Stream key
    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    /// Upstream address
    pub fn upstream_url(&self) -> &Url {
        &self.upstream_url
    }

    /// Local paths descriptors are rewritten to
    pub fn local_paths(&self) -> &LocalPaths {
        &self.local_paths
    }

    /// The ring buffer fed by this fetcher
    pub fn buffer(&self) -> &RingBuffer {
        &self.buffer
    }

    /// Current lifecycle state
    pub fn state(&self) -> FetcherState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition
    pub fn state_changes(&self) -> watch::Receiver<FetcherState> {
        self.state.subscribe()
    }

    /// Whether the fetcher reached its terminal state
    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    /// Statistics snapshot
    pub fn stats(&self) -> StreamStats {
        StreamStats::snapshot(
            self.key.to_string(),
            self.state(),
            self.created_at,
            &self.counters,
            self.buffer.len(),
            self.buffer.capacity(),
            self.buffer.active_cursors(),
        )
    }

    async fn run(self: Arc<Self>) {
        tracing::info!(
            stream = %self.key,
            upstream = %self.upstream_url,
            "Opening upstream"
        );
        self.transition(FetcherState::Opening);

        let mut failures: u32 = 0;

        loop {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.connect_and_pump(failures > 0) => result,
            };

            let error = match result {
                Ok(Disconnect { error, delivered }) => {
                    if delivered {
                        failures = 0;
                    }
                    error
                }
                Err(error) => error,
            };

            failures += 1;
            if !self.should_retry(failures, &error) {
                break;
            }

            self.transition(FetcherState::Retrying);
            let delay = backoff_delay(
                failures,
                self.config.initial_backoff,
                self.config.max_backoff,
            );

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.finish();
    }

    /// Log a failure and decide whether the retry budget allows another attempt
    fn should_retry(&self, failures: u32, error: &UpstreamError) -> bool {
        self.counters.record_failure();

        if failures > self.config.max_retries {
            tracing::error!(
                stream = %self.key,
                attempts = failures,
                error = %error,
                "Retry budget exhausted, closing restream"
            );
            return false;
        }

        tracing::warn!(
            stream = %self.key,
            attempt = failures,
            max_retries = self.config.max_retries,
            error = %error,
            "Upstream failed, retrying"
        );
        true
    }

    /// Open the upstream and copy its body into the buffer.
    ///
    /// Every opened connection eventually ends in a [`Disconnect`], including a
    /// clean end of the body. `Err` means the connection never opened.
    async fn connect_and_pump(&self, reconnecting: bool) -> Result<Disconnect, UpstreamError> {
        self.counters.record_attempt();

        let connect_timeout = self.config.connect_timeout;
        let mut body =
            match tokio::time::timeout(connect_timeout, self.client.open(&self.upstream_url)).await
            {
                Ok(result) => result?,
                Err(_) => return Err(UpstreamError::ConnectTimeout(connect_timeout)),
            };

        if reconnecting {
            self.counters.record_reconnect();
        }
        self.transition(FetcherState::Streaming);
        tracing::info!(
            stream = %self.key,
            reconnect = reconnecting,
            "Upstream connected"
        );

        let read_timeout = self.config.read_timeout;
        let mut delivered = false;

        loop {
            match tokio::time::timeout(read_timeout, body.next()).await {
                Ok(Some(Ok(chunk))) => {
                    self.buffer.write(&chunk);
                    self.counters.record_chunk(chunk.len());
                    delivered = true;
                }
                Ok(Some(Err(error))) => return Ok(Disconnect { error, delivered }),
                Ok(None) => {
                    return Ok(Disconnect {
                        error: UpstreamError::Ended,
                        delivered,
                    })
                }
                Err(_) => {
                    return Ok(Disconnect {
                        error: UpstreamError::Stalled(read_timeout),
                        delivered,
                    })
                }
            }
        }
    }

    fn finish(&self) {
        let closed_now = self.transition(FetcherState::Closed);
        self.buffer.close();
        if closed_now {
            tracing::info!(
                stream = %self.key,
                bytes = self.counters.bytes_received(),
                cursors = self.buffer.active_cursors(),
                "Restream closed"
            );
        }
    }

    /// Apply a state transition if it is legal; returns whether it happened.
    fn transition(&self, next: FetcherState) -> bool {
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                tracing::debug!(stream = %self.key, from = %current, to = %next, "State change");
                *current = next;
                true
            } else {
                false
            }
        })
    }
}

impl<C: UpstreamClient> Drop for UpstreamFetcher<C> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.buffer.close();
    }
}

impl<C: UpstreamClient> std::fmt::Debug for UpstreamFetcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamFetcher")
            .field("key", &self.key)
            .field("upstream_url", &self.upstream_url.as_str())
            .field("state", &self.state())
            .field("buffer", &self.buffer)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::buffer::BufferError;
    use crate::paths::{ProxyPaths, StaticBaseUrls};
    use crate::upstream::UpstreamBody;
    use bytes::Bytes;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// What the mock upstream does on one connection attempt
    pub(crate) enum Attempt {
        /// Refuse the connection
        Refuse,
        /// Never answer
        Hang,
        /// Send the chunks, then end the body
        Finish(Vec<&'static [u8]>),
        /// Send the chunks, then fail mid-stream
        Drop(Vec<&'static [u8]>),
        /// Send the chunks, then stay open without sending more
        Stall(Vec<&'static [u8]>),
    }

    /// Scripted upstream; once the script runs out every attempt is refused
    #[derive(Default)]
    pub(crate) struct MockUpstream {
        script: Mutex<VecDeque<Attempt>>,
        attempts: AtomicUsize,
    }

    impl MockUpstream {
        pub(crate) fn new(script: impl IntoIterator<Item = Attempt>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                attempts: AtomicUsize::new(0),
            }
        }

        pub(crate) fn refusing() -> Self {
            Self::default()
        }

        pub(crate) fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    fn chunks(data: Vec<&'static [u8]>) -> impl futures::Stream<Item = Result<Bytes, UpstreamError>> {
        stream::iter(data.into_iter().map(|c| Ok(Bytes::from_static(c))))
    }

    impl UpstreamClient for MockUpstream {
        async fn open(&self, _url: &Url) -> Result<UpstreamBody, UpstreamError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let attempt = self.script.lock().pop_front().unwrap_or(Attempt::Refuse);

            match attempt {
                Attempt::Refuse => Err(UpstreamError::Connect("connection refused".into())),
                Attempt::Hang => futures::future::pending().await,
                Attempt::Finish(data) => Ok(chunks(data).boxed()),
                Attempt::Drop(data) => Ok(chunks(data)
                    .chain(stream::once(async {
                        Err(UpstreamError::Body("connection reset".into()))
                    }))
                    .boxed()),
                Attempt::Stall(data) => Ok(chunks(data).chain(stream::pending()).boxed()),
            }
        }
    }

    pub(crate) fn test_config() -> FetcherConfig {
        FetcherConfig::default()
            .buffer_capacity(1024)
            .max_retries(3)
            .backoff(Duration::from_millis(1), Duration::from_millis(5))
            .connect_timeout(Duration::from_secs(5))
            .read_timeout(Duration::from_secs(5))
    }

    fn fetcher(upstream: MockUpstream, config: FetcherConfig) -> Arc<UpstreamFetcher<MockUpstream>> {
        let key = StreamKey::new("chan1").unwrap();
        let local_paths = ProxyPaths::default().local_paths(&StaticBaseUrls::default(), &key);
        Arc::new(UpstreamFetcher::new(
            key,
            Url::parse("http://provider.example/live/1.ts").unwrap(),
            local_paths,
            Arc::new(upstream),
            config,
        ))
    }

    async fn wait_for_state(fetcher: &UpstreamFetcher<MockUpstream>, state: FetcherState) {
        let mut changes = fetcher.state_changes();
        tokio::time::timeout(Duration::from_secs(5), changes.wait_for(|s| *s == state))
            .await
            .expect("timed out waiting for state")
            .expect("state channel closed");
    }

    async fn read_all(cursor: &mut ReadCursor) -> Result<Vec<u8>, BufferError> {
        let mut out = Vec::new();
        while let Some(chunk) = cursor.read(4096).await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn test_streams_into_buffer() {
        let fetcher = fetcher(
            MockUpstream::new([Attempt::Stall(vec![b"abc", b"def"])]),
            test_config(),
        );
        let mut cursor = fetcher.subscribe();
        assert_eq!(fetcher.state(), FetcherState::Created);

        fetcher.start();
        wait_for_state(&fetcher, FetcherState::Streaming).await;

        let mut got = Vec::new();
        while got.len() < 6 {
            got.extend_from_slice(&cursor.read(16).await.unwrap().unwrap());
        }
        assert_eq!(got, b"abcdef");

        let stats = fetcher.stats();
        assert_eq!(stats.bytes_received, 6);
        assert_eq!(stats.connect_attempts, 1);
        assert_eq!(stats.active_cursors, 1);

        fetcher.shutdown().await;
        assert_eq!(fetcher.state(), FetcherState::Closed);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_closes() {
        let fetcher = fetcher(MockUpstream::refusing(), test_config().max_retries(3));
        let mut cursor = fetcher.subscribe();

        fetcher.start();
        wait_for_state(&fetcher, FetcherState::Closed).await;

        assert_eq!(fetcher.client.attempts(), 4);
        assert_eq!(fetcher.stats().connect_failures, 4);
        assert_eq!(cursor.read(16).await, Ok(None));
    }

    #[tokio::test]
    async fn test_reconnects_after_drop() {
        let fetcher = fetcher(
            MockUpstream::new([
                Attempt::Drop(vec![b"first "]),
                Attempt::Refuse,
                Attempt::Stall(vec![b"second"]),
            ]),
            test_config(),
        );
        let mut cursor = fetcher.subscribe();

        fetcher.start();

        let mut got = Vec::new();
        while got.len() < 12 {
            got.extend_from_slice(&cursor.read(64).await.unwrap().unwrap());
        }
        assert_eq!(got, b"first second");
        assert_eq!(fetcher.state(), FetcherState::Streaming);

        let stats = fetcher.stats();
        assert_eq!(stats.connect_attempts, 3);
        assert_eq!(stats.connect_failures, 2);
        assert_eq!(stats.reconnects, 1);

        fetcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_delivered_data_resets_retry_budget() {
        let fetcher = fetcher(
            MockUpstream::new([
                Attempt::Refuse,
                Attempt::Drop(vec![b"a"]),
                Attempt::Refuse,
                Attempt::Drop(vec![b"b"]),
                Attempt::Refuse,
                Attempt::Finish(vec![b"c"]),
            ]),
            test_config().max_retries(2),
        );
        let mut cursor = fetcher.subscribe();

        fetcher.start();

        assert_eq!(read_all(&mut cursor).await.unwrap(), b"abc");
        // The last body end still had a full budget left: two more refusals
        assert_eq!(fetcher.client.attempts(), 8);
    }

    #[tokio::test]
    async fn test_clean_end_of_body_reconnects() {
        let fetcher = fetcher(
            MockUpstream::new([Attempt::Finish(vec![b"live"]), Attempt::Stall(vec![b"more"])]),
            test_config(),
        );
        let mut cursor = fetcher.subscribe();

        fetcher.start();

        let mut got = Vec::new();
        while got.len() < 8 {
            got.extend_from_slice(&cursor.read(64).await.unwrap().unwrap());
        }
        assert_eq!(got, b"livemore");
        assert_eq!(fetcher.state(), FetcherState::Streaming);
        assert_eq!(fetcher.client.attempts(), 2);
        assert_eq!(fetcher.stats().reconnects, 1);

        fetcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_bodies_exhaust_retry_budget() {
        let fetcher = fetcher(
            MockUpstream::new([
                Attempt::Finish(vec![]),
                Attempt::Finish(vec![]),
                Attempt::Finish(vec![]),
                Attempt::Stall(vec![b"never read"]),
            ]),
            test_config().max_retries(2),
        );
        let mut cursor = fetcher.subscribe();

        fetcher.start();
        wait_for_state(&fetcher, FetcherState::Closed).await;

        assert_eq!(fetcher.client.attempts(), 3);
        assert_eq!(cursor.read(16).await, Ok(None));
    }

    #[tokio::test]
    async fn test_connect_timeout_counts_as_failure() {
        let fetcher = fetcher(
            MockUpstream::new([Attempt::Hang, Attempt::Hang]),
            test_config()
                .max_retries(1)
                .connect_timeout(Duration::from_millis(20)),
        );

        fetcher.start();
        wait_for_state(&fetcher, FetcherState::Closed).await;

        assert_eq!(fetcher.client.attempts(), 2);
    }

    #[tokio::test]
    async fn test_read_stall_triggers_reconnect() {
        let fetcher = fetcher(
            MockUpstream::new([
                Attempt::Stall(vec![b"x"]),
                Attempt::Finish(vec![b"y"]),
            ]),
            test_config().read_timeout(Duration::from_millis(30)),
        );
        let mut cursor = fetcher.subscribe();

        fetcher.start();

        assert_eq!(read_all(&mut cursor).await.unwrap(), b"xy");
        assert_eq!(fetcher.stats().reconnects, 1);
    }

    #[tokio::test]
    async fn test_close_wakes_all_cursors() {
        let fetcher = fetcher(MockUpstream::new([Attempt::Stall(vec![])]), test_config());
        fetcher.start();
        wait_for_state(&fetcher, FetcherState::Streaming).await;

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let mut cursor = fetcher.subscribe();
                tokio::spawn(async move { cursor.read(64).await })
            })
            .collect();

        // Let every reader park on the buffer
        tokio::task::yield_now().await;
        fetcher.close();

        for reader in readers {
            let result = tokio::time::timeout(Duration::from_secs(1), reader)
                .await
                .expect("reader left blocked")
                .unwrap();
            assert_eq!(result, Ok(None));
        }
        assert_eq!(fetcher.state(), FetcherState::Closed);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let fetcher = fetcher(MockUpstream::new([Attempt::Stall(vec![b"z"])]), test_config());
        fetcher.start();

        fetcher.close();
        fetcher.close();
        fetcher.shutdown().await;
        fetcher.shutdown().await;

        assert_eq!(fetcher.state(), FetcherState::Closed);
    }

    #[tokio::test]
    async fn test_close_before_start_never_connects() {
        let fetcher = fetcher(MockUpstream::new([Attempt::Stall(vec![b"z"])]), test_config());

        fetcher.close();
        fetcher.start();
        tokio::task::yield_now().await;

        assert_eq!(fetcher.state(), FetcherState::Closed);
        assert_eq!(fetcher.client.attempts(), 0);
        assert!(fetcher.task.lock().is_none());
    }

    #[test]
    fn test_rewrite_uses_local_paths() {
        let fetcher = fetcher(MockUpstream::refusing(), test_config());
        let mut desc = StreamDescriptor::remote("http://provider.example/live/1.ts");

        fetcher.rewrite(&mut desc);

        assert_eq!(
            desc.path.as_deref(),
            Some("/LiveTv/LiveStreamFiles/chan1/stream.ts")
        );
        assert_eq!(
            desc.encoder_path.as_deref(),
            Some("http://127.0.0.1:8096/LiveTv/LiveStreamFiles/chan1/stream.ts")
        );
        assert!(desc.is_local_live_stream);
        assert!(desc.supports_direct_play);
        assert_eq!(fetcher.state(), FetcherState::Created);
    }
}
