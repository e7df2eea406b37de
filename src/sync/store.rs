//! Storage seams used by the refresh job.

use async_trait::async_trait;

use crate::data::models::{EquivalencyRecord, LedgerEntry, School, UpsertCounts};

/// Progress ledger, one row per job name.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Atomically set the job's period marker to `period` unless it already
    /// holds that value. Creates the row (cursor 0) on first use.
    ///
    /// Returns the stored cursor when the claim succeeded, `None` when the
    /// period was already claimed.
    async fn claim_period(&self, job_name: &str, period: &str) -> anyhow::Result<Option<i64>>;

    async fn write_cursor(&self, job_name: &str, cursor: i64) -> anyhow::Result<()>;

    async fn read(&self, job_name: &str) -> anyhow::Result<Option<LedgerEntry>>;
}

/// Durable equivalency records and the school directory.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Upsert by school id; an existing record is replaced entirely.
    /// An empty slice is a no-op returning zero counts.
    async fn commit(&self, records: &[EquivalencyRecord]) -> anyhow::Result<UpsertCounts>;

    async fn get(&self, school_id: &str) -> anyhow::Result<Option<EquivalencyRecord>>;

    async fn upsert_schools(&self, schools: &[School]) -> anyhow::Result<()>;
}
