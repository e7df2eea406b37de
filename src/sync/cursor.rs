//! Batch window planning over the ordered school list.
//!
//! The ledger stores a plain offset. Everything that interprets it (which
//! slice to fetch, where the next run starts, when to wrap) lives here.

use std::num::NonZeroUsize;
use std::ops::Range;

/// Where the next run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Partway through a sweep; the next window begins at this offset.
    MidSweep(usize),
    /// The previous sweep reached the end (or none has run yet); start over at 0.
    Wrapped,
}

impl CursorState {
    /// Interpret a stored ledger value. Non-positive values mean a fresh sweep.
    pub fn from_stored(raw: i64) -> Self {
        match usize::try_from(raw) {
            Ok(0) | Err(_) => CursorState::Wrapped,
            Ok(offset) => CursorState::MidSweep(offset),
        }
    }

    pub fn offset(self) -> usize {
        match self {
            CursorState::MidSweep(offset) => offset,
            CursorState::Wrapped => 0,
        }
    }

    /// Value written back to the ledger.
    pub fn to_stored(self) -> i64 {
        i64::try_from(self.offset()).unwrap_or(i64::MAX)
    }
}

/// The contiguous slice of schools handled by one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
    pub start: usize,
    pub end: usize,
    pub total: usize,
}

impl BatchWindow {
    /// Window of at most `batch_size` entries starting at `cursor`.
    ///
    /// A cursor past the end (the list shrank since the last run) yields an
    /// empty window that wraps.
    pub fn plan(cursor: CursorState, batch_size: NonZeroUsize, total: usize) -> Self {
        let start = cursor.offset().min(total);
        let end = start.saturating_add(batch_size.get()).min(total);
        Self { start, end, total }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Cursor after this window has been processed.
    pub fn next_cursor(&self) -> CursorState {
        if self.end < self.total {
            CursorState::MidSweep(self.end)
        } else {
            CursorState::Wrapped
        }
    }
}
