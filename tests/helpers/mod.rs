//! In-memory stand-ins for the database and the upstream service.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use transfer_sync::data::models::{
    Catalog, CourseEquivalency, EquivalencyRecord, LedgerEntry, School, UpsertCounts,
};
use transfer_sync::sync::admission::RefreshPeriod;
use transfer_sync::sync::orchestrator::{BatchSettings, CursorPolicy};
use transfer_sync::sync::store::{LedgerStore, RecordStore};
use transfer_sync::sync::{JobSettings, RefreshJob};
use transfer_sync::upstream::{EntitySource, EquivalencySource, UpstreamError};

pub const JOB: &str = "equivalency_refresh";

/// `count` schools in one region, ids zero-padded so they sort in order.
pub fn schools(count: usize) -> Vec<School> {
    (0..count)
        .map(|i| School {
            id: format!("S{i:04}"),
            name: format!("School {i}"),
            region: "GA".to_string(),
        })
        .collect()
}

pub fn equivalency(home: &str, external: &str, hours: &str) -> CourseEquivalency {
    CourseEquivalency {
        home_course: home.to_string(),
        external_course: external.to_string(),
        title: format!("{external} title"),
        credit_hours: hours.to_string(),
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    rows: Mutex<HashMap<String, (i64, Option<String>)>>,
    pub fail: AtomicBool,
}

impl MemoryLedger {
    pub fn cursor(&self, job_name: &str) -> Option<i64> {
        self.rows.lock().unwrap().get(job_name).map(|(c, _)| *c)
    }

    pub fn period(&self, job_name: &str) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .get(job_name)
            .and_then(|(_, p)| p.clone())
    }

    pub fn seed(&self, job_name: &str, cursor: i64, period: Option<&str>) {
        self.rows
            .lock()
            .unwrap()
            .insert(job_name.to_string(), (cursor, period.map(String::from)));
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn claim_period(&self, job_name: &str, period: &str) -> anyhow::Result<Option<i64>> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("ledger offline");
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows.entry(job_name.to_string()).or_insert((0, None));
        if row.1.as_deref() == Some(period) {
            return Ok(None);
        }
        row.1 = Some(period.to_string());
        Ok(Some(row.0))
    }

    async fn write_cursor(&self, job_name: &str, cursor: i64) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("ledger offline");
        }
        let mut rows = self.rows.lock().unwrap();
        rows.entry(job_name.to_string()).or_insert((0, None)).0 = cursor.max(0);
        Ok(())
    }

    async fn read(&self, job_name: &str) -> anyhow::Result<Option<LedgerEntry>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(job_name)
            .map(|(cursor, period)| LedgerEntry {
                job_name: job_name.to_string(),
                cursor: *cursor,
                period: period.clone(),
                updated_at: Utc::now(),
            }))
    }
}

#[derive(Default)]
pub struct MemoryRecords {
    rows: Mutex<HashMap<String, EquivalencyRecord>>,
    schools: Mutex<Vec<School>>,
    pub fail_commits: AtomicBool,
    pub commits: AtomicUsize,
}

impl MemoryRecords {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn record(&self, school_id: &str) -> Option<EquivalencyRecord> {
        self.rows.lock().unwrap().get(school_id).cloned()
    }

    pub fn insert(&self, record: EquivalencyRecord) {
        self.rows
            .lock()
            .unwrap()
            .insert(record.school_id.clone(), record);
    }

    pub fn school_count(&self) -> usize {
        self.schools.lock().unwrap().len()
    }
}

#[async_trait]
impl RecordStore for MemoryRecords {
    async fn commit(&self, records: &[EquivalencyRecord]) -> anyhow::Result<UpsertCounts> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail_commits.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset during bulk upsert");
        }
        let mut rows = self.rows.lock().unwrap();
        let mut counts = UpsertCounts::default();
        for record in records {
            match rows.insert(record.school_id.clone(), record.clone()) {
                Some(_) => counts.updated += 1,
                None => counts.inserted += 1,
            }
        }
        Ok(counts)
    }

    async fn get(&self, school_id: &str) -> anyhow::Result<Option<EquivalencyRecord>> {
        Ok(self.record(school_id))
    }

    async fn upsert_schools(&self, schools: &[School]) -> anyhow::Result<()> {
        *self.schools.lock().unwrap() = schools.to_vec();
        Ok(())
    }
}

pub struct StaticEntities {
    pub schools: Vec<School>,
    pub fail: AtomicBool,
}

impl StaticEntities {
    pub fn new(schools: Vec<School>) -> Self {
        Self {
            schools,
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EntitySource for StaticEntities {
    async fn list_all_entities(&self, _regions: &[String]) -> Result<Vec<School>, UpstreamError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::Status {
                status: 503,
                url: "http://upstream.test/regions/GA/schools".to_string(),
            });
        }
        Ok(self.schools.clone())
    }
}

/// Scriptable equivalency source. Every school gets two entries, one of them
/// non-credit, unless configured otherwise.
#[derive(Default)]
pub struct FakeSource {
    pub failing: HashSet<String>,
    pub hanging: HashSet<String>,
    pub termless: HashSet<String>,
    pub delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub catalog_calls: AtomicUsize,
    /// Catalog calls whose future is still alive, hung ones included.
    pub live_calls: AtomicUsize,
}

struct LiveCall<'a>(&'a AtomicUsize);

impl<'a> LiveCall<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LiveCall<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeSource {
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn hanging(ids: &[&str]) -> Self {
        Self {
            hanging: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl EquivalencySource for FakeSource {
    async fn get_catalog(&self, _region: &str, school_id: &str) -> Result<Catalog, UpstreamError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        let _live = LiveCall::enter(&self.live_calls);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.hanging.contains(school_id) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(school_id) {
            return Err(UpstreamError::Status {
                status: 500,
                url: format!("http://upstream.test/schools/{school_id}/catalog"),
            });
        }
        if self.termless.contains(school_id) {
            return Ok(Catalog {
                subjects: vec!["MATH".to_string()],
                terms: Vec::new(),
            });
        }
        Ok(Catalog {
            subjects: vec!["MATH".to_string(), "ENGL".to_string()],
            terms: vec!["202508".to_string(), "202502".to_string()],
        })
    }

    async fn get_equivalencies(
        &self,
        _region: &str,
        school_id: &str,
        subjects: &[String],
        term: &str,
    ) -> Result<Vec<CourseEquivalency>, UpstreamError> {
        assert_eq!(term, "202508", "the first catalog term is used");
        assert!(!subjects.is_empty());
        Ok(vec![
            equivalency("MATH 1551", &format!("MATH 1{}", &school_id[1..]), "4.0"),
            equivalency("1X1XXX", "ENGL 0999", "0.0"),
        ])
    }
}

pub fn settings(batch_size: usize, max_concurrent: usize, timeout: Duration) -> JobSettings {
    JobSettings {
        job_name: JOB.to_string(),
        regions: vec!["GA".to_string()],
        period: RefreshPeriod::Monthly,
        fetch_timeout: timeout,
        batch: BatchSettings {
            batch_size: NonZeroUsize::new(batch_size).unwrap(),
            max_concurrent_fetches: NonZeroUsize::new(max_concurrent).unwrap(),
            cursor_policy: CursorPolicy::Advance,
        },
    }
}

/// Job plus handles on every fake it was built from.
pub struct Harness {
    pub job: Arc<RefreshJob>,
    pub entities: Arc<StaticEntities>,
    pub source: Arc<FakeSource>,
    pub ledger: Arc<MemoryLedger>,
    pub records: Arc<MemoryRecords>,
}

impl Harness {
    pub fn new(settings: JobSettings, schools: Vec<School>, source: FakeSource) -> Self {
        Self::with_stores(
            settings,
            schools,
            source,
            Arc::new(MemoryLedger::default()),
            Arc::new(MemoryRecords::default()),
        )
    }

    pub fn with_stores(
        settings: JobSettings,
        schools: Vec<School>,
        source: FakeSource,
        ledger: Arc<MemoryLedger>,
        records: Arc<MemoryRecords>,
    ) -> Self {
        let entities = Arc::new(StaticEntities::new(schools));
        let source = Arc::new(source);
        let job = Arc::new(RefreshJob::new(
            settings,
            entities.clone(),
            source.clone(),
            ledger.clone(),
            records.clone(),
        ));
        Self {
            job,
            entities,
            source,
            ledger,
            records,
        }
    }
}
