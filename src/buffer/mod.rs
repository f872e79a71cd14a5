//! Shared circular byte buffer
//!
//! One writer appends the upstream byte stream; any number of readers consume
//! it through independent [`ReadCursor`]s.
//!
//! # Architecture
//!
//! ```text
//!                      RingBuffer (Arc<Shared>)
//!                 ┌──────────────────────────────┐
//!   write() ────► │ state: Mutex<RingState> {    │
//!                 │   buf, head, len,            │
//!                 │   start_offset, closed       │
//!                 │ }                            │
//!                 │ notify: Notify               │
//!                 └──────────────┬───────────────┘
//!                                │
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!       [ReadCursor]        [ReadCursor]        [ReadCursor]
//!       offset = 1024       offset = 9000       offset = 9100
//! ```
//!
//! Offsets are absolute positions in the logical byte stream. The buffer
//! retains the most recent `capacity` bytes; a cursor whose offset falls
//! behind the oldest retained byte has been overrun and must be replaced.

pub mod cursor;
pub mod error;
pub mod ring;

pub use cursor::ReadCursor;
pub use error::BufferError;
pub use ring::RingBuffer;
