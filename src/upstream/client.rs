//! Rate-limited HTTP client for the upstream equivalency service.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::future::try_join_all;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::config::RateLimitingConfig;
use crate::data::models::{Catalog, CourseEquivalency, School};
use crate::upstream::json::decode_with_context;
use crate::upstream::middleware::RequestLogger;
use crate::upstream::models::{CatalogResponse, EquivalencyItem, EquivalencyQuery, SchoolItem};
use crate::upstream::{EntitySource, EquivalencySource, UpstreamError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the upstream catalog/equivalency API.
///
/// Every request waits on a shared token bucket first, so concurrent fetch
/// tasks together stay inside the upstream's request budget.
pub struct UpstreamClient {
    http: ClientWithMiddleware,
    base_url: Url,
    limiter: DefaultDirectRateLimiter,
}

impl UpstreamClient {
    pub fn new(base_url: &str, limits: &RateLimitingConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid upstream base URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Upstream base URL cannot be a base: {base_url}");
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("transfer-sync/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(limits.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let http = ClientBuilder::new(http).with(RequestLogger).build();

        let quota = Quota::per_second(limits.requests_per_second).allow_burst(limits.burst);

        Ok(Self {
            http,
            base_url,
            limiter: RateLimiter::direct(quota),
        })
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, UpstreamError> {
        self.limiter.until_ready().await;

        let response = request.send().await?;
        let status = response.status();
        let url = response.url().to_string();

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        decode_with_context(&body).map_err(|source| UpstreamError::ParseFailed {
            status: status.as_u16(),
            url,
            source,
        })
    }

    /// Fetch the schools for a single region.
    pub async fn get_schools(&self, region: &str) -> Result<Vec<School>, UpstreamError> {
        let url = self.endpoint(&["regions", region, "schools"])?;
        let items: Vec<SchoolItem> = self.send(self.http.get(url)).await?;

        let mut schools: Vec<School> = items.into_iter().map(|s| s.into_school(region)).collect();
        // Upstream order is not guaranteed between calls
        schools.sort_by(|a, b| a.id.cmp(&b.id));

        debug!(region, count = schools.len(), "Fetched schools for region");
        Ok(schools)
    }
}

#[async_trait]
impl EntitySource for UpstreamClient {
    async fn list_all_entities(&self, regions: &[String]) -> Result<Vec<School>, UpstreamError> {
        let per_region = try_join_all(regions.iter().map(|r| self.get_schools(r))).await?;

        let mut seen = HashSet::new();
        let schools: Vec<School> = per_region
            .into_iter()
            .flatten()
            .filter(|s| seen.insert(s.id.clone()))
            .collect();

        info!(
            regions = regions.len(),
            schools = schools.len(),
            "Loaded school list"
        );
        Ok(schools)
    }
}

#[async_trait]
impl EquivalencySource for UpstreamClient {
    async fn get_catalog(&self, region: &str, school_id: &str) -> Result<Catalog, UpstreamError> {
        let url = self.endpoint(&["regions", region, "schools", school_id, "catalog"])?;
        let response: CatalogResponse = self.send(self.http.get(url)).await?;
        Ok(response.into())
    }

    async fn get_equivalencies(
        &self,
        region: &str,
        school_id: &str,
        subjects: &[String],
        term: &str,
    ) -> Result<Vec<CourseEquivalency>, UpstreamError> {
        let url = self.endpoint(&["regions", region, "schools", school_id, "equivalencies"])?;
        let query = EquivalencyQuery { subjects, term };
        let items: Vec<EquivalencyItem> = self.send(self.http.post(url).json(&query)).await?;
        Ok(items.into_iter().map(CourseEquivalency::from).collect())
    }
}
