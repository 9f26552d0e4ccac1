use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::ClientError;
use crate::types::SequenceNumber;

/// Tracks how far a feed has been consumed.
///
/// A cursor only ever moves strictly forward: advancing to a position at or
/// before the current one fails with [`ClientError::NonMonotonicCursor`],
/// which guards against duplicate or out-of-order handler invocations
/// corrupting the resume point. [`SequenceCursor::reset`] is the one
/// sanctioned way back to the beginning.
///
/// The default [`InMemorySequenceCursor`] lives and dies with the process.
/// Implement this trait over durable storage to resume across restarts; such
/// an implementation must serialize its own concurrent advances.
pub trait SequenceCursor: Send + Sync {
    /// The last consumed sequence number, 0 if nothing was consumed yet.
    fn current(&self) -> SequenceNumber;

    /// Moves the cursor strictly forward to `to`.
    fn advance(&self, to: SequenceNumber) -> Result<(), ClientError>;

    /// Returns the cursor to 0 for a full replay.
    fn reset(&self);
}

/// In-process [`SequenceCursor`] starting at zero or a caller-supplied offset.
#[derive(Debug, Default)]
pub struct InMemorySequenceCursor {
    last_consumed: AtomicI64,
}

impl InMemorySequenceCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(position: SequenceNumber) -> Result<Self, ClientError> {
        if position < 0 {
            return Err(ClientError::Validation(format!(
                "cursor position must not be negative, got {}",
                position
            )));
        }
        Ok(Self {
            last_consumed: AtomicI64::new(position),
        })
    }
}

impl SequenceCursor for InMemorySequenceCursor {
    fn current(&self) -> SequenceNumber {
        self.last_consumed.load(Ordering::SeqCst)
    }

    fn advance(&self, to: SequenceNumber) -> Result<(), ClientError> {
        if to < 0 {
            return Err(ClientError::Validation(format!(
                "cursor position must not be negative, got {}",
                to
            )));
        }

        let current = self.last_consumed.load(Ordering::SeqCst);
        if to <= current {
            return Err(ClientError::NonMonotonicCursor {
                current,
                requested: to,
            });
        }

        self.last_consumed.store(to, Ordering::SeqCst);
        Ok(())
    }

    fn reset(&self) {
        self.last_consumed.store(0, Ordering::SeqCst);
    }
}
