//! Database operations for the `sync_ledger` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::models::LedgerEntry;

/// Claim `period` for `job_name` unless it is already the stored period.
///
/// Single statement: the row is created on first use, and the conflict
/// branch only fires when the stored period differs. No row comes back when
/// the period was already claimed.
pub async fn claim_period(pool: &PgPool, job_name: &str, period: &str) -> Result<Option<i64>> {
    let cursor = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO sync_ledger (job_name, cursor, period)
        VALUES ($1, 0, $2)
        ON CONFLICT (job_name)
        DO UPDATE SET period = EXCLUDED.period, updated_at = now()
        WHERE sync_ledger.period IS DISTINCT FROM EXCLUDED.period
        RETURNING cursor
        "#,
    )
    .bind(job_name)
    .bind(period)
    .fetch_optional(pool)
    .await
    .context("failed to claim ledger period")?;

    Ok(cursor)
}

/// Store the cursor for the next run.
pub async fn write_cursor(pool: &PgPool, job_name: &str, cursor: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sync_ledger (job_name, cursor)
        VALUES ($1, $2)
        ON CONFLICT (job_name)
        DO UPDATE SET cursor = EXCLUDED.cursor, updated_at = now()
        "#,
    )
    .bind(job_name)
    .bind(cursor.max(0))
    .execute(pool)
    .await
    .context("failed to write ledger cursor")?;

    Ok(())
}

pub async fn get(pool: &PgPool, job_name: &str) -> Result<Option<LedgerEntry>> {
    let row = sqlx::query_as::<_, (String, i64, Option<String>, DateTime<Utc>)>(
        "SELECT job_name, cursor, period, updated_at FROM sync_ledger WHERE job_name = $1",
    )
    .bind(job_name)
    .fetch_optional(pool)
    .await
    .context("failed to read ledger")?;

    Ok(row.map(|(job_name, cursor, period, updated_at)| LedgerEntry {
        job_name,
        cursor,
        period,
        updated_at,
    }))
}
