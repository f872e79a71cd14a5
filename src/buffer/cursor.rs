//! Independent read position into a [`RingBuffer`](super::RingBuffer)

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, Stream};

use super::error::BufferError;
use super::ring::{ReadOutcome, Shared};

/// Per-consumer read cursor
///
/// Each cursor advances on its own; a slow cursor never stalls the writer or
/// other cursors. Dropping the cursor detaches it from the buffer.
pub struct ReadCursor {
    shared: Arc<Shared>,
    offset: u64,
    overrun: Option<BufferError>,
}

impl ReadCursor {
    pub(super) fn new(shared: Arc<Shared>, offset: u64) -> Self {
        Self {
            shared,
            offset,
            overrun: None,
        }
    }

    /// Absolute offset of the next byte this cursor will read
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether this cursor has been overrun and can no longer be read
    pub fn is_overrun(&self) -> bool {
        self.overrun.is_some()
    }

    /// Read up to `max_bytes` unread bytes.
    ///
    /// Waits until bytes are written or the buffer is closed. Returns
    /// `Ok(None)` at end-of-stream and [`BufferError::Overrun`] once the
    /// writer has moved more than one capacity past this cursor; an overrun
    /// cursor keeps failing and must be replaced by a fresh one. A cursor that
    /// falls behind only after the buffer was closed gets `Ok(None)` instead.
    ///
    /// Cancel-safe: dropping the future before it completes leaves the cursor
    /// where it was.
    pub async fn read(&mut self, max_bytes: usize) -> Result<Option<Bytes>, BufferError> {
        if let Some(ref err) = self.overrun {
            return Err(err.clone());
        }
        if max_bytes == 0 {
            return Ok(Some(Bytes::new()));
        }

        loop {
            // Register interest before checking, so a write landing between the
            // check and the await still wakes us.
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let outcome = self.shared.state.lock().read_at(self.offset, max_bytes);
            match outcome {
                ReadOutcome::Data(bytes) => {
                    self.offset += bytes.len() as u64;
                    return Ok(Some(bytes));
                }
                ReadOutcome::Closed => return Ok(None),
                ReadOutcome::Overrun { oldest_offset } => {
                    let err = BufferError::Overrun {
                        cursor_offset: self.offset,
                        oldest_offset,
                    };
                    tracing::debug!(
                        cursor_offset = self.offset,
                        oldest_offset = oldest_offset,
                        "Read cursor overrun"
                    );
                    self.overrun = Some(err.clone());
                    return Err(err);
                }
                ReadOutcome::Empty => {}
            }

            notified.await;
        }
    }

    /// Turn this cursor into a stream of chunks of at most `chunk_size` bytes.
    ///
    /// The stream ends at end-of-stream and yields a single error on overrun.
    pub fn into_stream(
        self,
        chunk_size: usize,
    ) -> impl Stream<Item = Result<Bytes, BufferError>> + Send + 'static {
        let chunk_size = chunk_size.max(1);
        stream::unfold(Some(self), move |cursor| async move {
            let mut cursor = cursor?;
            match cursor.read(chunk_size).await {
                Ok(Some(bytes)) => Some((Ok(bytes), Some(cursor))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

impl Drop for ReadCursor {
    fn drop(&mut self) {
        self.shared.state.lock().detach();
    }
}

impl std::fmt::Debug for ReadCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadCursor")
            .field("offset", &self.offset)
            .field("overrun", &self.overrun.is_some())
            .finish()
    }
}
