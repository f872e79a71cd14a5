//! Registry configuration

use std::time::Duration;

use crate::paths::ProxyPaths;
use crate::upstream::FetcherConfig;

/// Configuration for the stream registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Configuration handed to every fetcher
    pub fetcher: FetcherConfig,

    /// Local proxy path template
    pub paths: ProxyPaths,

    /// Close and remove restreams nobody has read for this long.
    /// `None` keeps every restream until shutdown.
    ///
    /// The clock runs from the last time a descriptor was pointed at the
    /// restream or its last cursor detached, so this is also how long a
    /// player gets to attach after receiving the rewritten descriptor.
    pub idle_timeout: Option<Duration>,

    /// How often the cleanup task runs
    pub cleanup_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            paths: ProxyPaths::default(),
            idle_timeout: None,
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl RegistryConfig {
    /// Set the fetcher configuration
    pub fn fetcher(mut self, config: FetcherConfig) -> Self {
        self.fetcher = config;
        self
    }

    /// Set the proxy path template
    pub fn paths(mut self, paths: ProxyPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Enable idle eviction
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
