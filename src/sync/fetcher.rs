//! Two-stage fetch of one school's equivalencies.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time;
use tracing::{debug, warn};

use crate::data::models::{EquivalencyRecord, School};
use crate::upstream::{EquivalencySource, UpstreamError};
use crate::utils::fmt_duration;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to fetch catalog")]
    Catalog(#[source] UpstreamError),
    #[error("catalog lists no terms")]
    NoTerms,
    #[error("failed to fetch equivalencies for term {term}")]
    Equivalencies {
        term: String,
        #[source]
        source: UpstreamError,
    },
    #[error("fetch timed out after {0:?}")]
    TimedOut(Duration),
}

impl FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Catalog(e) | FetchError::Equivalencies { source: e, .. } => {
                e.is_transient()
            }
            FetchError::TimedOut(_) => true,
            FetchError::NoTerms => false,
        }
    }
}

/// Fetches catalog then equivalencies for a school, under a deadline.
#[derive(Clone)]
pub struct EntityFetcher {
    source: Arc<dyn EquivalencySource>,
    timeout: Duration,
}

impl EntityFetcher {
    pub fn new(source: Arc<dyn EquivalencySource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Returns `None` on any failure; the cause is logged here and goes no further.
    pub async fn fetch(&self, school: &School) -> Option<EquivalencyRecord> {
        let start = Instant::now();
        match self.try_fetch(school).await {
            Ok(record) => {
                debug!(
                    school_id = %school.id,
                    school = %school.name,
                    term = %record.term,
                    equivalents = record.equivalents.len(),
                    duration = fmt_duration(start.elapsed()),
                    "Gathered equivalencies"
                );
                Some(record)
            }
            Err(e) => {
                warn!(
                    school_id = %school.id,
                    school = %school.name,
                    region = %school.region,
                    transient = e.is_transient(),
                    duration = fmt_duration(start.elapsed()),
                    error = ?e,
                    "Failed to gather equivalencies for school"
                );
                None
            }
        }
    }

    /// Dropping the inner future on timeout cancels the in-flight request.
    pub async fn try_fetch(&self, school: &School) -> Result<EquivalencyRecord, FetchError> {
        time::timeout(self.timeout, self.fetch_stages(school))
            .await
            .map_err(|_| FetchError::TimedOut(self.timeout))?
    }

    async fn fetch_stages(&self, school: &School) -> Result<EquivalencyRecord, FetchError> {
        let catalog = self
            .source
            .get_catalog(&school.region, &school.id)
            .await
            .map_err(FetchError::Catalog)?;

        let term = catalog.terms.into_iter().next().ok_or(FetchError::NoTerms)?;

        let equivalents = self
            .source
            .get_equivalencies(&school.region, &school.id, &catalog.subjects, &term)
            .await
            .map_err(|source| FetchError::Equivalencies {
                term: term.clone(),
                source,
            })?;

        Ok(EquivalencyRecord {
            school_id: school.id.clone(),
            school_name: school.name.clone(),
            term,
            equivalents,
        })
    }
}
