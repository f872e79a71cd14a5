//! Upstream fetching
//!
//! An [`UpstreamFetcher`] owns exactly one upstream connection for one stream
//! key and copies every received chunk into its [`RingBuffer`](crate::buffer::RingBuffer).
//!
//! ```text
//!   UpstreamClient::open() ──► body stream ──► RingBuffer::write()
//!            ▲                      │
//!            │   failure / stall    ▼
//!            └──── backoff ◄── Retrying        cursors ◄── subscribe()
//! ```
//!
//! Connect failures and mid-stream drops are retried with exponential backoff
//! until `max_retries` consecutive failures, after which the fetcher closes
//! and its cursors observe end-of-stream.

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod state;

pub use client::{HttpUpstreamClient, UpstreamBody, UpstreamClient};
pub use config::FetcherConfig;
pub use error::UpstreamError;
pub use fetcher::{Restream, UpstreamFetcher};
pub use state::FetcherState;
