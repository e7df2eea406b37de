use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::sync::{RefreshJob, RunReport, SyncError};
use crate::utils::fmt_duration;

/// Fires the refresh trigger on a fixed interval.
///
/// Admission control still applies, so a short interval only means the
/// period's single run starts soon after the period opens.
pub struct RefreshScheduler {
    job: Arc<RefreshJob>,
    interval: Duration,
    grace: Duration,
}

impl RefreshScheduler {
    pub fn new(job: Arc<RefreshJob>, interval: Duration, grace: Duration) -> Self {
        Self {
            job,
            interval,
            grace,
        }
    }

    /// Runs until a shutdown signal arrives. An in-flight run gets `grace` to
    /// finish before it is cancelled.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            interval = fmt_duration(self.interval),
            job = self.job.job_name(),
            "Refresh scheduler started"
        );

        let mut next_run = time::Instant::now();
        let mut current: Option<(JoinHandle<()>, CancellationToken)> = None;

        loop {
            tokio::select! {
                _ = time::sleep_until(next_run) => {
                    next_run = time::Instant::now() + self.interval;

                    if let Some((ref handle, _)) = current
                        && !handle.is_finished()
                    {
                        trace!("Previous refresh still running, skipping");
                        continue;
                    }

                    let cancel = CancellationToken::new();
                    let handle = tokio::spawn({
                        let job = self.job.clone();
                        let cancel = cancel.clone();
                        async move {
                            tokio::select! {
                                result = job.trigger() => log_run_result(&result),
                                _ = cancel.cancelled() => warn!("Scheduled refresh cancelled during shutdown"),
                            }
                        }
                    });
                    current = Some((handle, cancel));
                }
                _ = shutdown_rx.recv() => {
                    info!("Refresh scheduler received shutdown signal");

                    if let Some((mut handle, cancel)) = current.take() {
                        if time::timeout(self.grace, &mut handle).await.is_err() {
                            cancel.cancel();
                            if time::timeout(Duration::from_secs(1), handle).await.is_err() {
                                warn!("Refresh run did not stop after cancellation, abandoning");
                            }
                        } else {
                            trace!("Refresh run completed before shutdown");
                        }
                    }

                    info!("Refresh scheduler exiting gracefully");
                    break;
                }
            }
        }
    }
}

/// Log a run result at a level matching its severity.
pub fn log_run_result(result: &Result<RunReport, SyncError>) {
    match result {
        Ok(report) => info!(
            period = %report.period,
            fetched = report.fetched,
            failed = report.failed,
            next_cursor = report.next_cursor,
            "Refresh run succeeded"
        ),
        Err(SyncError::AdmissionDenied { period }) => {
            debug!(period = %period, "Refresh skipped, period already used");
        }
        Err(e) => error!(error = ?e, "Refresh run failed"),
    }
}
