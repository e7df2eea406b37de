//! Wire formats returned by the upstream equivalency service.

use serde::{Deserialize, Deserializer, Serialize};

use crate::data::models::{Catalog, CourseEquivalency, School};

/// Entry from `GET regions/{region}/schools`.
#[derive(Debug, Clone, Deserialize)]
pub struct SchoolItem {
    pub id: String,
    pub name: String,
}

impl SchoolItem {
    pub fn into_school(self, region: &str) -> School {
        School {
            id: self.id,
            name: self.name.trim().to_string(),
            region: region.to_string(),
        }
    }
}

/// A subject or term entry. Only the code is used; other fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeItem {
    pub id: String,
}

/// Body of `GET regions/{region}/schools/{id}/catalog`.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub subjects: Vec<CodeItem>,
    #[serde(default)]
    pub terms: Vec<CodeItem>,
}

impl From<CatalogResponse> for Catalog {
    fn from(value: CatalogResponse) -> Self {
        Catalog {
            subjects: value.subjects.into_iter().map(|s| s.id).collect(),
            terms: value.terms.into_iter().map(|t| t.id).collect(),
        }
    }
}

/// Body sent to `POST regions/{region}/schools/{id}/equivalencies`.
#[derive(Debug, Serialize)]
pub struct EquivalencyQuery<'a> {
    pub subjects: &'a [String],
    pub term: &'a str,
}

/// One row of the equivalency listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquivalencyItem {
    /// Home-institution course, e.g. `"MATH 1551"`.
    pub ga_equivalent: String,
    /// The school's own course, e.g. `"MATH 2413"`.
    pub class_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(deserialize_with = "credit_hours_verbatim")]
    pub credit_hours: String,
}

impl From<EquivalencyItem> for CourseEquivalency {
    fn from(value: EquivalencyItem) -> Self {
        CourseEquivalency {
            home_course: value.ga_equivalent,
            external_course: value.class_name,
            title: value.title,
            credit_hours: value.credit_hours,
        }
    }
}

/// Credit hours arrive as either a string (`"3.0"`) or a bare number (`3.0`).
///
/// Strings are kept byte for byte. Numbers go through `serde_json::Number`, so
/// they come out in its canonical form: `3.10` becomes `"3.1"` and `4` stays
/// `"4"`. The `"0.0"` non-credit marker survives either way.
fn credit_hours_verbatim<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}
