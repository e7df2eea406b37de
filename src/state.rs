//! Application state shared by the web handlers and the scheduler.

use std::sync::Arc;

use crate::sync::RefreshJob;
use crate::sync::store::{LedgerStore, RecordStore};

#[derive(Clone)]
pub struct AppState {
    pub job: Arc<RefreshJob>,
    pub ledger: Arc<dyn LedgerStore>,
    pub records: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new(
        job: Arc<RefreshJob>,
        ledger: Arc<dyn LedgerStore>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            job,
            ledger,
            records,
        }
    }
}
