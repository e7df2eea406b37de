//! The equivalency refresh job: admission, batch window, fetch, commit, cursor.

pub mod admission;
pub mod cursor;
pub mod fetcher;
pub mod orchestrator;
pub mod scheduler;
pub mod store;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::sync::admission::{Admission, RefreshPeriod};
use crate::sync::fetcher::EntityFetcher;
use crate::sync::orchestrator::{BatchOrchestrator, BatchSettings};
use crate::sync::store::{LedgerStore, RecordStore};
use crate::upstream::{EntitySource, EquivalencySource, UpstreamError};
use crate::utils::fmt_duration;

/// Invocation-level failures. Per-school fetch failures never reach this level.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Refresh can only run once per period; {period} has already run")]
    AdmissionDenied { period: String },
    #[error("Failed to load the school list")]
    EntitySource(#[source] UpstreamError),
    #[error("Ledger unavailable")]
    Ledger(#[source] anyhow::Error),
    #[error("Failed to persist {records} equivalency records")]
    Persistence {
        records: usize,
        #[source]
        source: anyhow::Error,
    },
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub period: String,
    pub attempted: usize,
    pub fetched: usize,
    pub failed: usize,
    pub inserted: u64,
    pub updated: u64,
    pub next_cursor: usize,
}

#[derive(Debug, Clone)]
pub struct JobSettings {
    pub job_name: String,
    pub regions: Vec<String>,
    pub period: RefreshPeriod,
    pub fetch_timeout: Duration,
    pub batch: BatchSettings,
}

impl JobSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            job_name: config.job_name.clone(),
            regions: config.regions.clone(),
            period: config.refresh_period,
            fetch_timeout: config.fetch_timeout,
            batch: BatchSettings {
                batch_size: config.batch_size,
                max_concurrent_fetches: config.max_concurrent_fetches,
                cursor_policy: config.cursor_policy,
            },
        }
    }
}

pub struct RefreshJob {
    job_name: String,
    regions: Vec<String>,
    period: RefreshPeriod,
    entities: Arc<dyn EntitySource>,
    ledger: Arc<dyn LedgerStore>,
    records: Arc<dyn RecordStore>,
    orchestrator: BatchOrchestrator,
}

impl RefreshJob {
    pub fn new(
        settings: JobSettings,
        entities: Arc<dyn EntitySource>,
        source: Arc<dyn EquivalencySource>,
        ledger: Arc<dyn LedgerStore>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        let fetcher = EntityFetcher::new(source, settings.fetch_timeout);
        let orchestrator = BatchOrchestrator::new(fetcher, records.clone(), settings.batch);
        Self {
            job_name: settings.job_name,
            regions: settings.regions,
            period: settings.period,
            entities,
            ledger,
            records,
            orchestrator,
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub async fn trigger(&self) -> Result<RunReport, SyncError> {
        self.trigger_at(Utc::now()).await
    }

    /// Run one batch if the period containing `now` has not been used yet.
    ///
    /// The cursor is written after the commit has been attempted, including
    /// when the commit failed; the cursor policy decides its value.
    #[instrument(skip_all, fields(job = %self.job_name))]
    pub async fn trigger_at(&self, now: DateTime<Utc>) -> Result<RunReport, SyncError> {
        let start = Instant::now();

        let claim = admission::acquire(self.ledger.as_ref(), &self.job_name, self.period, now)
            .await
            .map_err(SyncError::Ledger)?;
        let (cursor, period) = match claim {
            Admission::Admitted { cursor, period } => (cursor, period),
            Admission::Denied { period } => return Err(SyncError::AdmissionDenied { period }),
        };

        let schools = self
            .entities
            .list_all_entities(&self.regions)
            .await
            .map_err(SyncError::EntitySource)?;

        if let Err(e) = self.records.upsert_schools(&schools).await {
            warn!(
                count = schools.len(),
                error = ?e,
                "Failed to save school directory (non-fatal)"
            );
        }

        let outcome = self.orchestrator.run_batch(cursor, &schools).await;

        self.ledger
            .write_cursor(&self.job_name, outcome.next_cursor.to_stored())
            .await
            .map_err(SyncError::Ledger)?;

        info!(
            period = %period,
            attempted = outcome.attempted(),
            fetched = outcome.fetched,
            failed = outcome.failed(),
            inserted = outcome.counts.inserted,
            updated = outcome.counts.updated,
            next_cursor = outcome.next_cursor.offset(),
            duration = fmt_duration(start.elapsed()),
            "Refresh run finished"
        );

        let report = RunReport {
            period,
            attempted: outcome.attempted(),
            fetched: outcome.fetched,
            failed: outcome.failed(),
            inserted: outcome.counts.inserted,
            updated: outcome.counts.updated,
            next_cursor: outcome.next_cursor.offset(),
        };

        match outcome.persist_error {
            Some(source) => Err(SyncError::Persistence {
                records: report.fetched,
                source,
            }),
            None => Ok(report),
        }
    }
}
