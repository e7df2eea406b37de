//! Runs one batch window: bounded concurrent fetches, then a single bulk commit.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, error, info, info_span, warn};

use crate::data::models::{EquivalencyRecord, School, UpsertCounts};
use crate::sync::cursor::{BatchWindow, CursorState};
use crate::sync::fetcher::EntityFetcher;
use crate::sync::store::RecordStore;
use crate::utils::fmt_duration;

/// What happens to the cursor when the bulk commit fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorPolicy {
    /// Move on to the next window anyway; the failed window is picked up on the next sweep.
    #[default]
    Advance,
    /// Keep the cursor so the next admitted run retries the same window.
    RetryWindow,
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub batch_size: NonZeroUsize,
    pub max_concurrent_fetches: NonZeroUsize,
    pub cursor_policy: CursorPolicy,
}

/// Result of one batch run.
#[derive(Debug)]
pub struct BatchOutcome {
    pub window: BatchWindow,
    /// Schools whose fetch produced a record.
    pub fetched: usize,
    pub counts: UpsertCounts,
    /// Cursor to persist for the next run.
    pub next_cursor: CursorState,
    /// Set when the bulk commit failed.
    pub persist_error: Option<anyhow::Error>,
}

impl BatchOutcome {
    pub fn attempted(&self) -> usize {
        self.window.len()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.fetched
    }
}

pub struct BatchOrchestrator {
    fetcher: EntityFetcher,
    records: Arc<dyn RecordStore>,
    settings: BatchSettings,
}

impl BatchOrchestrator {
    pub fn new(
        fetcher: EntityFetcher,
        records: Arc<dyn RecordStore>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            fetcher,
            records,
            settings,
        }
    }

    /// Fetch and persist the window of `schools` starting at `cursor`.
    pub async fn run_batch(&self, cursor: CursorState, schools: &[School]) -> BatchOutcome {
        let window = BatchWindow::plan(cursor, self.settings.batch_size, schools.len());
        let batch = &schools[window.range()];

        info!(
            start = window.start,
            end = window.end,
            total = window.total,
            batch_size = batch.len(),
            "Starting batch"
        );

        let start = Instant::now();
        let records = self.gather(batch).await;
        let fetched = records.len();

        info!(
            attempted = batch.len(),
            fetched,
            failed = batch.len() - fetched,
            duration = fmt_duration(start.elapsed()),
            "Equivalencies gathered"
        );

        let (counts, persist_error) = match self.records.commit(&records).await {
            Ok(counts) => {
                info!(
                    inserted = counts.inserted,
                    updated = counts.updated,
                    "Bulk import completed"
                );
                (counts, None)
            }
            Err(e) => {
                error!(records = records.len(), error = ?e, "Bulk import failed");
                (UpsertCounts::default(), Some(e))
            }
        };

        let next_cursor = match (&persist_error, self.settings.cursor_policy) {
            (Some(_), CursorPolicy::RetryWindow) => {
                warn!(cursor = cursor.offset(), "Keeping cursor so the window is retried");
                cursor
            }
            _ => window.next_cursor(),
        };

        BatchOutcome {
            window,
            fetched,
            counts,
            next_cursor,
            persist_error,
        }
    }

    /// One task per school, at most `max_concurrent_fetches` running at once.
    /// Failed and panicked tasks are dropped from the result. Dropping the
    /// returned future aborts every fetch still in flight.
    async fn gather(&self, batch: &[School]) -> Vec<EquivalencyRecord> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_fetches.get()));
        let mut tasks = JoinSet::new();

        for school in batch.iter().cloned() {
            let fetcher = self.fetcher.clone();
            let semaphore = semaphore.clone();
            let span = info_span!("fetch_school", school_id = %school.id);
            tasks.spawn(
                async move {
                    let _permit = semaphore.acquire_owned().await.ok()?;
                    fetcher.fetch(&school).await
                }
                .instrument(span),
            );
        }

        let mut records = Vec::with_capacity(batch.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => error!(error = %e, "Fetch task panicked"),
            }
        }
        records
    }
}
