//! Stream registry implementation
//!
//! The central table mapping each stream key to its single restream.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::buffer::ReadCursor;
use crate::descriptor::StreamDescriptor;
use crate::paths::BaseUrlResolver;
use crate::stats::StreamStats;
use crate::upstream::{HttpUpstreamClient, UpstreamClient, UpstreamFetcher};

use super::config::RegistryConfig;
use super::error::RegistryError;
use super::key::StreamKey;

/// The registry as the host application knows it
pub type RestreamManager<C = HttpUpstreamClient> = StreamRegistry<C>;

/// Central registry for all restreams
///
/// Guarantees at most one [`UpstreamFetcher`] per key. Lookups take the read
/// lock; creation takes the write lock and inserts only if the key is still
/// absent.
pub struct StreamRegistry<C: UpstreamClient = HttpUpstreamClient> {
    /// Map of stream key to restream
    streams: RwLock<HashMap<StreamKey, Arc<UpstreamFetcher<C>>>>,

    /// Shared upstream client
    client: Arc<C>,

    /// Base addresses for local paths
    resolver: Arc<dyn BaseUrlResolver>,

    /// Configuration
    config: RegistryConfig,
}

impl StreamRegistry<HttpUpstreamClient> {
    /// Create a registry fetching over HTTP(S)
    pub fn http(
        resolver: Arc<dyn BaseUrlResolver>,
        config: RegistryConfig,
    ) -> crate::error::Result<Self> {
        let client = HttpUpstreamClient::new(&config.fetcher)?;
        Ok(Self::with_client(client, resolver, config))
    }
}

impl<C: UpstreamClient> StreamRegistry<C> {
    /// Create a registry with a custom upstream client
    pub fn with_client(client: C, resolver: Arc<dyn BaseUrlResolver>, config: RegistryConfig) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            client: Arc::new(client),
            resolver,
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Make sure a restream exists for `key` and point `descriptor` at it.
    ///
    /// The first call for a key validates the descriptor's upstream URL,
    /// creates the restream and starts it in the background without waiting
    /// for the upstream. Later calls copy the existing restream's paths onto
    /// `descriptor`. Fails with [`RegistryError::StreamUnavailable`] when the
    /// restream for `key` has given up; the descriptor is left untouched.
    pub async fn ensure_restream(
        &self,
        key: &StreamKey,
        descriptor: &mut StreamDescriptor,
    ) -> Result<(), RegistryError> {
        let fetcher = self.get_or_insert(key, descriptor).await?;

        if fetcher.is_closed() {
            tracing::debug!(stream = %key, "Restream requested after it closed");
            return Err(RegistryError::StreamUnavailable(key.clone()));
        }

        fetcher.rewrite(descriptor);
        Ok(())
    }

    /// Same as [`ensure_restream`](Self::ensure_restream) but returns the
    /// restream itself, for callers that attach cursors directly.
    ///
    /// A closed restream is still returned; its cursors report end-of-stream.
    pub async fn get_or_create_restream(
        &self,
        key: &StreamKey,
        descriptor: &mut StreamDescriptor,
    ) -> Result<Arc<UpstreamFetcher<C>>, RegistryError> {
        let fetcher = self.get_or_insert(key, descriptor).await?;

        if !fetcher.is_closed() {
            fetcher.rewrite(descriptor);
        }
        Ok(fetcher)
    }

    async fn get_or_insert(
        &self,
        key: &StreamKey,
        descriptor: &StreamDescriptor,
    ) -> Result<Arc<UpstreamFetcher<C>>, RegistryError> {
        // Fast path: restream already exists
        if let Some(fetcher) = self.streams.read().await.get(key) {
            return Ok(Arc::clone(fetcher));
        }

        let upstream_url = descriptor.upstream_url()?;

        let mut streams = self.streams.write().await;
        match streams.entry(key.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!(stream = %key, "Reusing restream created by concurrent request");
                Ok(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => {
                let local_paths = self.config.paths.local_paths(self.resolver.as_ref(), key);
                let fetcher = Arc::new(UpstreamFetcher::new(
                    key.clone(),
                    upstream_url,
                    local_paths,
                    Arc::clone(&self.client),
                    self.config.fetcher.clone(),
                ));
                fetcher.start();
                entry.insert(Arc::clone(&fetcher));

                tracing::info!(
                    stream = %key,
                    path = %fetcher.local_paths().path,
                    "Restream registered"
                );

                Ok(fetcher)
            }
        }
    }

    /// Get the restream for `key`, if any
    pub async fn get(&self, key: &StreamKey) -> Option<Arc<UpstreamFetcher<C>>> {
        self.streams.read().await.get(key).cloned()
    }

    /// Attach a new cursor to the restream for `key`.
    ///
    /// This is what a serving endpoint uses to stream bytes to one client.
    pub async fn open_cursor(&self, key: &StreamKey) -> Result<ReadCursor, RegistryError> {
        let streams = self.streams.read().await;

        let fetcher = streams
            .get(key)
            .ok_or_else(|| RegistryError::StreamNotFound(key.clone()))?;

        Ok(fetcher.subscribe())
    }

    /// Get stream statistics
    pub async fn stream_stats(&self, key: &StreamKey) -> Option<StreamStats> {
        self.streams.read().await.get(key).map(|f| f.stats())
    }

    /// Get total number of restreams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    /// Run cleanup once
    ///
    /// With an idle timeout configured, closes and removes restreams that are
    /// closed or have had no cursor attached for longer than the timeout.
    /// Without one, does nothing.
    pub async fn cleanup(&self) {
        let Some(idle_timeout) = self.config.idle_timeout else {
            return;
        };
        let now = Instant::now();

        let removed: Vec<Arc<UpstreamFetcher<C>>> = {
            let mut streams = self.streams.write().await;

            let keys: Vec<StreamKey> = streams
                .iter()
                .filter(|(_, fetcher)| {
                    fetcher.is_closed()
                        || fetcher
                            .buffer()
                            .idle_since()
                            .is_some_and(|since| now.duration_since(since) > idle_timeout)
                })
                .map(|(key, _)| key.clone())
                .collect();

            keys.iter().filter_map(|key| streams.remove(key)).collect()
        };

        for fetcher in removed {
            tracing::info!(stream = %fetcher.key(), "Restream removed by cleanup");
            fetcher.shutdown().await;
        }
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.cleanup().await;
            }
        })
    }

    /// Close every restream and wait for their tasks to exit
    pub async fn shutdown(&self) {
        let fetchers: Vec<_> = self.streams.write().await.drain().map(|(_, f)| f).collect();

        tracing::info!(streams = fetchers.len(), "Shutting down restreams");

        for fetcher in fetchers {
            fetcher.shutdown().await;
        }
    }
}
