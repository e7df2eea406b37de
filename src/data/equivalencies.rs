//! Database operations for the `equivalencies` table.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use sqlx::PgPool;
use sqlx::types::Json;

use crate::data::models::{CourseEquivalency, EquivalencyRecord, UpsertCounts};

/// Collapse records sharing a school id, keeping the last one.
///
/// Postgres rejects an `ON CONFLICT DO UPDATE` that touches the same row twice
/// in one statement, and last-write-wins is the record semantics anyway.
pub fn dedupe_last_wins(records: &[EquivalencyRecord]) -> Vec<&EquivalencyRecord> {
    let mut by_id: IndexMap<&str, &EquivalencyRecord> = IndexMap::with_capacity(records.len());
    for record in records {
        by_id.insert(record.school_id.as_str(), record);
    }
    by_id.into_values().collect()
}

/// Batch upsert records by school id, replacing existing rows entirely.
pub async fn batch_upsert(pool: &PgPool, records: &[EquivalencyRecord]) -> Result<UpsertCounts> {
    if records.is_empty() {
        return Ok(UpsertCounts::default());
    }

    let records = dedupe_last_wins(records);

    let school_ids: Vec<&str> = records.iter().map(|r| r.school_id.as_str()).collect();
    let school_names: Vec<&str> = records.iter().map(|r| r.school_name.as_str()).collect();
    let terms: Vec<&str> = records.iter().map(|r| r.term.as_str()).collect();
    let equivalents: Vec<serde_json::Value> = records
        .iter()
        .map(|r| serde_json::to_value(&r.equivalents))
        .collect::<Result<_, _>>()
        .context("failed to encode equivalents")?;

    // xmax = 0 only for freshly inserted tuples
    let inserted_flags = sqlx::query_scalar::<_, bool>(
        r#"
        INSERT INTO equivalencies (school_id, school_name, term, equivalents)
        SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::jsonb[])
        ON CONFLICT (school_id)
        DO UPDATE SET
            school_name = EXCLUDED.school_name,
            term = EXCLUDED.term,
            equivalents = EXCLUDED.equivalents,
            updated_at = now()
        RETURNING (xmax = 0)
        "#,
    )
    .bind(&school_ids)
    .bind(&school_names)
    .bind(&terms)
    .bind(&equivalents)
    .fetch_all(pool)
    .await
    .context("failed to batch upsert equivalencies")?;

    let inserted = inserted_flags.iter().filter(|&&fresh| fresh).count() as u64;
    Ok(UpsertCounts {
        inserted,
        updated: inserted_flags.len() as u64 - inserted,
    })
}

/// Point lookup of one school's record.
pub async fn get(pool: &PgPool, school_id: &str) -> Result<Option<EquivalencyRecord>> {
    let row = sqlx::query_as::<_, (String, String, String, Json<Vec<CourseEquivalency>>)>(
        "SELECT school_id, school_name, term, equivalents FROM equivalencies WHERE school_id = $1",
    )
    .bind(school_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch equivalencies")?;

    Ok(row.map(
        |(school_id, school_name, term, Json(equivalents))| EquivalencyRecord {
            school_id,
            school_name,
            term,
            equivalents,
        },
    ))
}
