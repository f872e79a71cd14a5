//! Shared-buffer restreaming for external live streams
//!
//! A media server that plays remote live streams (IPTV channels, tuner
//! URLs) would otherwise open one upstream connection per viewer. This crate
//! keeps exactly one upstream connection per stream, copies its bytes into a
//! bounded ring buffer, and lets any number of local readers consume that
//! buffer independently.
//!
//! # Overview
//!
//! - [`registry::StreamRegistry`]: key to restream table with single-flight
//!   creation. [`ensure_restream`](registry::StreamRegistry::ensure_restream)
//!   starts the upstream in the background and rewrites the playback
//!   descriptor to point at the local proxy path.
//! - [`upstream::UpstreamFetcher`]: owns the upstream connection, retries
//!   with exponential backoff, and feeds the buffer.
//! - [`buffer::RingBuffer`] / [`buffer::ReadCursor`]: single writer, many
//!   readers, each with its own absolute offset.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use restream_rs::paths::StaticBaseUrls;
//! use restream_rs::registry::{RegistryConfig, StreamKey, StreamRegistry};
//! use restream_rs::StreamDescriptor;
//!
//! # async fn example() -> restream_rs::Result<()> {
//! let registry = StreamRegistry::http(
//!     Arc::new(StaticBaseUrls::default()),
//!     RegistryConfig::default(),
//! )?;
//!
//! let mut descriptor = StreamDescriptor::remote("http://provider.example/live/1001.ts");
//! let key = StreamKey::for_descriptor(&descriptor)?;
//! registry.ensure_restream(&key, &mut descriptor).await?;
//!
//! // Serving endpoint, once per viewer
//! let mut cursor = registry.open_cursor(&key).await?;
//! while let Some(chunk) = cursor.read(64 * 1024).await? {
//!     // write chunk to the viewer
//! #   let _ = chunk;
//! }
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod descriptor;
pub mod error;
pub mod paths;
pub mod registry;
pub mod stats;
pub mod upstream;

pub use buffer::{BufferError, ReadCursor, RingBuffer};
pub use descriptor::{MediaProtocol, StreamDescriptor};
pub use error::{Error, Result};
pub use paths::{BaseUrlResolver, LocalPaths, ProxyPaths, StaticBaseUrls};
pub use registry::{RegistryConfig, RegistryError, RestreamManager, StreamKey, StreamRegistry};
pub use stats::StreamStats;
pub use upstream::{FetcherConfig, FetcherState, HttpUpstreamClient, UpstreamClient, UpstreamFetcher};
