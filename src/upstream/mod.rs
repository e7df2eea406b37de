//! Client and collaborator traits for the upstream equivalency service.

pub mod client;
pub mod errors;
pub mod json;
pub mod middleware;
pub mod models;

pub use client::UpstreamClient;
pub use errors::UpstreamError;

use async_trait::async_trait;

use crate::data::models::{Catalog, CourseEquivalency, School};

/// Supplies the full ordered list of schools.
///
/// Implementations must return the same order for the same input within a run,
/// since the ledger cursor is an offset into this list.
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn list_all_entities(&self, regions: &[String]) -> Result<Vec<School>, UpstreamError>;
}

/// Per-school catalog and equivalency lookups.
#[async_trait]
pub trait EquivalencySource: Send + Sync {
    async fn get_catalog(&self, region: &str, school_id: &str) -> Result<Catalog, UpstreamError>;

    async fn get_equivalencies(
        &self,
        region: &str,
        school_id: &str,
        subjects: &[String],
        term: &str,
    ) -> Result<Vec<CourseEquivalency>, UpstreamError>;
}
