//! Buffer error types
//!
//! Errors surfaced to the caller holding a read cursor.

/// Error type for ring buffer reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// The cursor fell more than one buffer capacity behind the writer and the
    /// bytes it had not yet read were overwritten
    Overrun {
        /// Absolute offset the cursor was positioned at
        cursor_offset: u64,
        /// Absolute offset of the oldest byte still retained
        oldest_offset: u64,
    },
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::Overrun {
                cursor_offset,
                oldest_offset,
            } => write!(
                f,
                "Cursor overrun: cursor at offset {}, oldest retained offset {}",
                cursor_offset, oldest_offset
            ),
        }
    }
}

impl std::error::Error for BufferError {}
