use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::PgPool;

use crate::data::models::{EquivalencyRecord, LedgerEntry, School, UpsertCounts};
use crate::data::{equivalencies, ledger, schools};
use crate::sync::store::{LedgerStore, RecordStore};
use crate::utils::log_if_slow;

const SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(500);

/// Postgres-backed implementation of the job's storage seams.
#[derive(Clone)]
pub struct DbContext {
    pool: PgPool,
}

impl DbContext {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for DbContext {
    async fn claim_period(&self, job_name: &str, period: &str) -> anyhow::Result<Option<i64>> {
        ledger::claim_period(&self.pool, job_name, period).await
    }

    async fn write_cursor(&self, job_name: &str, cursor: i64) -> anyhow::Result<()> {
        ledger::write_cursor(&self.pool, job_name, cursor).await
    }

    async fn read(&self, job_name: &str) -> anyhow::Result<Option<LedgerEntry>> {
        ledger::get(&self.pool, job_name).await
    }
}

#[async_trait]
impl RecordStore for DbContext {
    async fn commit(&self, records: &[EquivalencyRecord]) -> anyhow::Result<UpsertCounts> {
        let start = Instant::now();
        let result = equivalencies::batch_upsert(&self.pool, records).await;
        log_if_slow(start, SLOW_QUERY_THRESHOLD, "equivalencies::batch_upsert");
        result
    }

    async fn get(&self, school_id: &str) -> anyhow::Result<Option<EquivalencyRecord>> {
        equivalencies::get(&self.pool, school_id).await
    }

    async fn upsert_schools(&self, schools: &[School]) -> anyhow::Result<()> {
        let start = Instant::now();
        let result = schools::batch_upsert(&self.pool, schools).await;
        log_if_slow(start, SLOW_QUERY_THRESHOLD, "schools::batch_upsert");
        result
    }
}
