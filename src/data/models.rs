//! Domain types shared by the sync job, the stores, and the web layer.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Credit-hour literal the upstream uses for entries that carry no credit.
pub const NON_CREDIT_HOURS: &str = "0.0";

/// A school whose catalog is matched against the home institution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    pub id: String,
    pub name: String,
    pub region: String,
}

/// Subjects and terms offered by one school.
///
/// Terms are ordered as the upstream returns them; only the first one is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub subjects: Vec<String>,
    pub terms: Vec<String>,
}

/// A single course correspondence between a school and the home institution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseEquivalency {
    pub home_course: String,
    pub external_course: String,
    pub title: String,
    /// Opaque text; string values from the upstream are kept exactly.
    pub credit_hours: String,
}

impl CourseEquivalency {
    pub fn is_credit_bearing(&self) -> bool {
        self.credit_hours != NON_CREDIT_HOURS
    }

    /// Department prefix of the external course (e.g. `"MATH"` for `"MATH 1501"`).
    pub fn department(&self) -> &str {
        self.external_course
            .split_whitespace()
            .next()
            .unwrap_or_default()
    }

    /// Whether this entry maps onto the given home course, ignoring spacing and case.
    pub fn matches_home_course(&self, code: &str) -> bool {
        normalize_course_code(&self.home_course) == normalize_course_code(code)
    }
}

/// Strip all whitespace and lowercase, so `"CS 1301"` and `"cs1301"` compare equal.
pub fn normalize_course_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// One persisted row: every equivalency known for a school under a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquivalencyRecord {
    pub school_id: String,
    pub school_name: String,
    pub term: String,
    pub equivalents: Vec<CourseEquivalency>,
}

/// Group credit-bearing entries by external department for elective selection.
///
/// Departments keep the order in which they first appear.
pub fn elective_groups(entries: &[CourseEquivalency]) -> IndexMap<&str, Vec<&CourseEquivalency>> {
    let mut groups: IndexMap<&str, Vec<&CourseEquivalency>> = IndexMap::new();
    for entry in entries.iter().filter(|e| e.is_credit_bearing()) {
        groups.entry(entry.department()).or_default().push(entry);
    }
    groups
}

/// Persisted progress of a batch job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub job_name: String,
    pub cursor: i64,
    /// Period key of the last admitted run, e.g. `"2026-10"`.
    pub period: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Row counts produced by a bulk upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
    pub inserted: u64,
    pub updated: u64,
}
