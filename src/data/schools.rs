//! Database operations for the `schools` directory table.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::data::models::School;

/// Batch upsert the school directory as returned by the upstream.
pub async fn batch_upsert(pool: &PgPool, schools: &[School]) -> Result<()> {
    if schools.is_empty() {
        return Ok(());
    }

    let ids: Vec<&str> = schools.iter().map(|s| s.id.as_str()).collect();
    let names: Vec<&str> = schools.iter().map(|s| s.name.as_str()).collect();
    let regions: Vec<&str> = schools.iter().map(|s| s.region.as_str()).collect();

    sqlx::query(
        r#"
        INSERT INTO schools (school_id, name, region)
        SELECT DISTINCT ON (school_id) * FROM UNNEST($1::text[], $2::text[], $3::text[])
            AS t(school_id, name, region)
        ON CONFLICT (school_id)
        DO UPDATE SET name = EXCLUDED.name, region = EXCLUDED.region, updated_at = now()
        WHERE schools.name IS DISTINCT FROM EXCLUDED.name
           OR schools.region IS DISTINCT FROM EXCLUDED.region
        "#,
    )
    .bind(&ids)
    .bind(&names)
    .bind(&regions)
    .execute(pool)
    .await
    .context("failed to batch upsert schools")?;

    Ok(())
}
