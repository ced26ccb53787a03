//! Daily job runner for the time-driven subsystems.
//!
//! Each job gets its own tokio task, a fixed UTC trigger time, a shared
//! [`CancellationToken`] for shutdown and a per-job running flag. A trigger
//! that finds its job still running is skipped and logged; the job bodies
//! are idempotent, so a manual [`JobRunner::run_now`] racing a scheduled run
//! is harmless either way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alerts::AlertSink;
use crate::documents::{DocumentLifecycleScheduler, ExpirationSweepReport, UpcomingExpirySweepReport};
use crate::pep::{DowngradeSweepReport, PepStatusTracker, ReviewSweepReport};
use crate::settings::ScheduleSettings;
use crate::types::Clock;
use crate::KycRiskResult;

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySchedule {
    pub at: NaiveTime,
}

impl DailySchedule {
    pub fn at(at: NaiveTime) -> Self {
        DailySchedule { at }
    }

    /// First trigger strictly after `now`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.at).and_utc();
        if today > now {
            return today;
        }
        now.date_naive()
            .checked_add_days(Days::new(1))
            .map(|d| d.and_time(self.at).and_utc())
            .unwrap_or(today)
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobReport {
    ExpirationSweep(ExpirationSweepReport),
    UpcomingExpirySweep(UpcomingExpirySweepReport),
    PepReviews(ReviewSweepReport),
    PepDowngrades(DowngradeSweepReport),
}

/// Job name and report of a run that finished.
pub type CompletedRun = (&'static str, JobReport);

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, today: NaiveDate) -> KycRiskResult<JobReport>;
}

/// Expires lapsed documents and raises a CRITICAL alert for each.
pub struct ExpirationSweepJob {
    pub documents: Arc<DocumentLifecycleScheduler>,
    pub alerts: Arc<dyn AlertSink>,
}

#[async_trait]
impl ScheduledJob for ExpirationSweepJob {
    fn name(&self) -> &'static str {
        "document-expiration-sweep"
    }

    async fn run(&self, today: NaiveDate) -> KycRiskResult<JobReport> {
        let mut report = self.documents.run_expiration_sweep(today).await?;
        for alert in report.alerts(today) {
            if let Err(e) = self.alerts.document_alert(&alert).await {
                warn!(document_id = %alert.document_id, error = %e, "Failed to deliver expiration alert");
                report.errors += 1;
            }
        }
        Ok(JobReport::ExpirationSweep(report))
    }
}

pub struct UpcomingExpiryJob {
    pub documents: Arc<DocumentLifecycleScheduler>,
    pub alerts: Arc<dyn AlertSink>,
}

#[async_trait]
impl ScheduledJob for UpcomingExpiryJob {
    fn name(&self) -> &'static str {
        "document-upcoming-expiry-sweep"
    }

    async fn run(&self, today: NaiveDate) -> KycRiskResult<JobReport> {
        let report = self
            .documents
            .run_upcoming_expiry_sweep(today, self.alerts.as_ref())
            .await?;
        Ok(JobReport::UpcomingExpirySweep(report))
    }
}

pub struct PepReviewJob {
    pub tracker: Arc<PepStatusTracker>,
    pub alerts: Arc<dyn AlertSink>,
}

#[async_trait]
impl ScheduledJob for PepReviewJob {
    fn name(&self) -> &'static str {
        "pep-review-query"
    }

    async fn run(&self, today: NaiveDate) -> KycRiskResult<JobReport> {
        let report = self.tracker.run_review_sweep(today, self.alerts.as_ref()).await?;
        Ok(JobReport::PepReviews(report))
    }
}

pub struct PepDowngradeJob {
    pub tracker: Arc<PepStatusTracker>,
}

#[async_trait]
impl ScheduledJob for PepDowngradeJob {
    fn name(&self) -> &'static str {
        "pep-downgrade-sweep"
    }

    async fn run(&self, today: NaiveDate) -> KycRiskResult<JobReport> {
        Ok(JobReport::PepDowngrades(self.tracker.run_downgrade_sweep(today).await?))
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Clears the running flag when the run finishes, is cancelled or panics.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct JobRunner {
    job: Arc<dyn ScheduledJob>,
    schedule: DailySchedule,
    clock: Arc<dyn Clock>,
    running: AtomicBool,
}

impl JobRunner {
    pub fn new(job: Arc<dyn ScheduledJob>, schedule: DailySchedule, clock: Arc<dyn Clock>) -> Self {
        Self {
            job,
            schedule,
            clock,
            running: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.job.name()
    }

    pub fn schedule(&self) -> DailySchedule {
        self.schedule
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run once now through the overlap guard. `Ok(None)` means a run of
    /// this job was already in progress and this trigger was skipped.
    pub async fn run_now(&self) -> KycRiskResult<Option<JobReport>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(job = self.name(), "Previous run still in progress, skipping trigger");
            return Ok(None);
        }
        let _guard = RunningGuard(&self.running);

        let today = self.clock.today();
        info!(job = self.name(), %today, "Starting scheduled job");
        match self.job.run(today).await {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                // next trigger retries; no internal retry loop
                error!(job = self.name(), %today, error = %e, "Scheduled job failed");
                Err(e)
            }
        }
    }

    /// Spawn the trigger loop. It exits when `token` is cancelled; an
    /// in-flight run is dropped at its next await point.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        self.spawn_loop(token, None)
    }

    /// Like [`Self::spawn`], and every completed run's report is sent on
    /// `completed` so the owner can persist state between triggers.
    pub fn spawn_reporting(
        self: Arc<Self>,
        token: CancellationToken,
        completed: mpsc::UnboundedSender<CompletedRun>,
    ) -> JoinHandle<()> {
        self.spawn_loop(token, Some(completed))
    }

    fn spawn_loop(
        self: Arc<Self>,
        token: CancellationToken,
        completed: Option<mpsc::UnboundedSender<CompletedRun>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(job = self.name(), at = %self.schedule.at, "Job scheduled");
            loop {
                let now = self.clock.now();
                let next = self.schedule.next_run_after(now);
                let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                tokio::select! {
                    _ = token.cancelled() => break,
                    // failures are logged inside run_now
                    outcome = self.run_now() => {
                        if let (Ok(Some(report)), Some(tx)) = (outcome, completed.as_ref()) {
                            if tx.send((self.name(), report)).is_err() {
                                debug!(job = self.name(), "Report receiver dropped");
                            }
                        }
                    }
                }
            }
            info!(job = self.name(), "Job stopped");
        })
    }
}

/// The four daily jobs wired from settings.
pub struct JobScheduler {
    runners: Vec<Arc<JobRunner>>,
}

impl JobScheduler {
    pub fn new(
        schedule: &ScheduleSettings,
        documents: Arc<DocumentLifecycleScheduler>,
        tracker: Arc<PepStatusTracker>,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let jobs: Vec<(Arc<dyn ScheduledJob>, NaiveTime)> = vec![
            (
                Arc::new(ExpirationSweepJob {
                    documents: documents.clone(),
                    alerts: alerts.clone(),
                }),
                schedule.expiration_sweep_at,
            ),
            (
                Arc::new(UpcomingExpiryJob {
                    documents,
                    alerts: alerts.clone(),
                }),
                schedule.upcoming_expiry_sweep_at,
            ),
            (
                Arc::new(PepReviewJob {
                    tracker: tracker.clone(),
                    alerts,
                }),
                schedule.pep_review_at,
            ),
            (Arc::new(PepDowngradeJob { tracker }), schedule.pep_downgrade_at),
        ];
        let runners = jobs
            .into_iter()
            .map(|(job, at)| Arc::new(JobRunner::new(job, DailySchedule::at(at), clock.clone())))
            .collect();
        JobScheduler { runners }
    }

    pub fn runners(&self) -> &[Arc<JobRunner>] {
        &self.runners
    }

    pub fn spawn_all(&self, token: &CancellationToken) -> Vec<JoinHandle<()>> {
        self.runners
            .iter()
            .map(|r| r.clone().spawn(token.child_token()))
            .collect()
    }

    pub fn spawn_all_reporting(
        &self,
        token: &CancellationToken,
        completed: &mpsc::UnboundedSender<CompletedRun>,
    ) -> Vec<JoinHandle<()>> {
        self.runners
            .iter()
            .map(|r| r.clone().spawn_reporting(token.child_token(), completed.clone()))
            .collect()
    }

    /// Run every job once, in trigger-time order. A failing job does not stop
    /// the others.
    pub async fn run_all_now(&self) -> Vec<(&'static str, KycRiskResult<Option<JobReport>>)> {
        let mut ordered: Vec<&Arc<JobRunner>> = self.runners.iter().collect();
        ordered.sort_by_key(|r| r.schedule.at);
        let mut results = Vec::with_capacity(ordered.len());
        for runner in ordered {
            results.push((runner.name(), runner.run_now().await));
        }
        results
    }
}
