//! Admission control: at most one refresh run per calendar period.

use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::sync::cursor::CursorState;
use crate::sync::store::LedgerStore;

/// Granularity of the run budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPeriod {
    Daily,
    /// ISO 8601 week.
    Weekly,
    #[default]
    Monthly,
}

impl RefreshPeriod {
    /// Stable key for the period containing `at`, e.g. `"2026-10"`, `"2026-W42"`.
    pub fn key_for(self, at: DateTime<Utc>) -> String {
        match self {
            RefreshPeriod::Daily => at.format("%Y-%m-%d").to_string(),
            RefreshPeriod::Weekly => {
                let week = at.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            RefreshPeriod::Monthly => at.format("%Y-%m").to_string(),
        }
    }
}

/// Result of asking for a run slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The period was claimed; the run starts at `cursor`.
    Admitted { cursor: CursorState, period: String },
    /// A run already happened in `period`. Nothing was changed.
    Denied { period: String },
}

/// Claim the run slot for the period containing `now`.
///
/// The claim is a single compare-and-set on the ledger's period marker, so of
/// several concurrent callers in one period exactly one is admitted. The slot
/// is consumed on admission, before any upstream call, so a failing run does
/// not get retried within the same period.
pub async fn acquire(
    ledger: &dyn LedgerStore,
    job_name: &str,
    period: RefreshPeriod,
    now: DateTime<Utc>,
) -> anyhow::Result<Admission> {
    let key = period.key_for(now);

    match ledger.claim_period(job_name, &key).await? {
        Some(stored) => {
            let cursor = CursorState::from_stored(stored);
            info!(job_name, period = %key, cursor = cursor.offset(), "Refresh run admitted");
            Ok(Admission::Admitted {
                cursor,
                period: key,
            })
        }
        None => {
            debug!(job_name, period = %key, "Refresh already ran this period");
            Ok(Admission::Denied { period: key })
        }
    }
}
