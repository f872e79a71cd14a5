//! Stream registry for restream deduplication
//!
//! The registry guarantees that every stream key has at most one upstream
//! connection, no matter how many viewers ask for it.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<StreamRegistry>
//!                   ┌───────────────────────────┐
//!                   │ streams: HashMap<Key,     │
//!                   │   Arc<UpstreamFetcher> {  │
//!                   │     ring buffer,          │
//!                   │     fetch task,           │
//!                   │   }                       │
//!                   │ >                         │
//!                   └─────────────┬─────────────┘
//!                                 │
//!        ┌────────────────────────┼────────────────────────┐
//!        │                        │                        │
//!        ▼                        ▼                        ▼
//!  [Playback info]          [Serving endpoint]       [Serving endpoint]
//!  ensure_restream()        open_cursor()            open_cursor()
//!  rewrites descriptor      cursor.read() ──► HTTP   cursor.read() ──► HTTP
//! ```
//!
//! # Single Flight
//!
//! Creation happens under the table's write lock and only inserts when the
//! key is still absent, so concurrent first requests for the same key all
//! end up with the same restream. The restream starts connecting in the
//! background; callers never wait for the upstream.

pub mod config;
pub mod error;
pub mod key;
pub mod store;

pub use config::RegistryConfig;
pub use error::RegistryError;
pub use key::StreamKey;
pub use store::{RestreamManager, StreamRegistry};
