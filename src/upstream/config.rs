//! Fetcher configuration

use std::time::Duration;

/// Default ring buffer capacity (16MB)
pub const DEFAULT_BUFFER_CAPACITY: usize = 16 * 1024 * 1024;

/// Default number of retries after the first failed attempt
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Upstream fetcher configuration options
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Ring buffer capacity in bytes
    pub buffer_capacity: usize,

    /// Consecutive failed attempts tolerated after the first one
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Upper bound on the retry delay
    pub max_backoff: Duration,

    /// Opening the upstream response must complete within this time
    pub connect_timeout: Duration,

    /// Disconnect if no data is received for this long
    pub read_timeout: Duration,

    /// User-Agent sent upstream
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            user_agent: concat!("restream-rs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetcherConfig {
    /// Set the ring buffer capacity (at least one byte)
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(1);
        self
    }

    /// Set the retry budget
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the backoff range
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the User-Agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
