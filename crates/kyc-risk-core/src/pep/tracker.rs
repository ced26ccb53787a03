use std::sync::Arc;

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use super::{downgrade_period_months, DecisionOutcome, PepDetails, PepInformation, PepRiskFactor, PepStatus, PepType};
use crate::alerts::AlertSink;
use crate::error::KycRiskError;
use crate::settings::PepSettings;
use crate::store::{DossierStore, PepRepository};
use crate::types::{DossierId, Principal};
use crate::KycRiskResult;

/// Former PEP nearing the end of the cooling-off period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DowngradeCandidate {
    pub dossier_id: DossierId,
    pub cessation_date: NaiveDate,
    pub downgrade_date: NaiveDate,
}

/// Periodic re-screening due for a PEP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDue {
    pub dossier_id: DossierId,
    pub pep_type: PepType,
    pub review_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DowngradeSweepReport {
    pub candidates: usize,
    pub downgraded: Vec<DossierId>,
    pub skipped: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSweepReport {
    pub reviews: Vec<ReviewDue>,
    pub alerts_sent: usize,
    pub errors: usize,
}

/// Maintains PEP classification per dossier and drives its two clocks:
/// the periodic review date and the former-PEP downgrade countdown.
pub struct PepStatusTracker {
    peps: Arc<dyn PepRepository>,
    dossiers: Arc<dyn DossierStore>,
    settings: PepSettings,
}

impl PepStatusTracker {
    pub fn new(
        peps: Arc<dyn PepRepository>,
        dossiers: Arc<dyn DossierStore>,
        settings: PepSettings,
    ) -> Self {
        Self {
            peps,
            dossiers,
            settings,
        }
    }

    pub fn settings(&self) -> &PepSettings {
        &self.settings
    }

    pub async fn get(&self, dossier_id: DossierId) -> KycRiskResult<PepInformation> {
        self.peps
            .find(dossier_id)
            .await?
            .ok_or_else(|| KycRiskError::not_found("pep record", dossier_id))
    }

    /// Current factor for the `pep` scoring category. A dossier without a
    /// record has never been classified and scores as non-PEP.
    pub async fn risk_factor(&self, dossier_id: DossierId) -> KycRiskResult<PepRiskFactor> {
        Ok(self
            .peps
            .find(dossier_id)
            .await?
            .map(|p| p.risk_factor())
            .unwrap_or_else(PepRiskFactor::not_pep))
    }

    #[instrument(skip(self, details))]
    pub async fn classify(
        &self,
        dossier_id: DossierId,
        pep_type: PepType,
        details: PepDetails,
        today: NaiveDate,
    ) -> KycRiskResult<PepInformation> {
        let mut info = self
            .peps
            .find(dossier_id)
            .await?
            .unwrap_or_else(|| PepInformation::not_pep(dossier_id));
        info.classify(pep_type, details, today, self.settings.review_interval_months)?;
        self.commit(info, "pep classification changed").await
    }

    #[instrument(skip(self))]
    pub async fn record_cessation(
        &self,
        dossier_id: DossierId,
        cessation_date: NaiveDate,
        today: NaiveDate,
    ) -> KycRiskResult<PepInformation> {
        let mut info = self.get(dossier_id).await?;
        info.record_cessation(cessation_date, today)?;
        self.commit(info, "pep role ended").await
    }

    #[instrument(skip(self))]
    pub async fn declassify(
        &self,
        dossier_id: DossierId,
        today: NaiveDate,
        reason: &str,
    ) -> KycRiskResult<PepInformation> {
        let mut info = self.get(dossier_id).await?;
        info.declassify(today, reason)?;
        self.commit(info, "pep declassified").await
    }

    /// Record the compliance officer's decision and schedule the next review.
    #[instrument(skip(self))]
    pub async fn complete_review(
        &self,
        dossier_id: DossierId,
        outcome: DecisionOutcome,
        decided_by: Principal,
        today: NaiveDate,
    ) -> KycRiskResult<PepInformation> {
        let mut info = self.get(dossier_id).await?;
        info.complete_review(outcome, decided_by, today, self.settings.review_interval_months)?;
        info.validate()?;
        let expected = info.version;
        if !self.peps.save_if_version(&info, expected).await? {
            warn!(%dossier_id, "PEP record changed while completing review");
            return Err(KycRiskError::conflict("pep record", dossier_id));
        }
        info.version = expected + 1;
        info!(%dossier_id, ?outcome, "PEP review completed");
        Ok(info)
    }

    /// Like [`Self::try_commit`], but a lost race is a `Conflict` error.
    async fn commit(&self, info: PepInformation, reason: &str) -> KycRiskResult<PepInformation> {
        let dossier_id = info.dossier_id;
        self.try_commit(info, reason)
            .await?
            .ok_or_else(|| KycRiskError::conflict("pep record", dossier_id))
    }

    /// Flag the dossier first so a failed save costs at most one extra
    /// re-evaluation, never a missed one. The save is conditional on the
    /// version `info` was read at; `None` means another writer got there first.
    async fn try_commit(&self, mut info: PepInformation, reason: &str) -> KycRiskResult<Option<PepInformation>> {
        info.validate()?;
        self.dossiers
            .flag_for_reevaluation(info.dossier_id, reason)
            .await
            .inspect_err(|e| {
                error!(dossier_id = %info.dossier_id, error = %e, "Failed to flag dossier for re-evaluation");
            })?;
        let expected = info.version;
        let saved = self.peps.save_if_version(&info, expected).await.inspect_err(|e| {
            error!(dossier_id = %info.dossier_id, error = %e, "Failed to save PEP record");
        })?;
        if !saved {
            warn!(dossier_id = %info.dossier_id, expected_version = expected, reason, "PEP record changed concurrently, update not applied");
            return Ok(None);
        }
        info.version = expected + 1;
        info!(dossier_id = %info.dossier_id, status = ?info.status(), reason, "PEP status changed");
        Ok(Some(info))
    }

    /// Former PEPs whose cessation date is on or before `threshold_date`,
    /// oldest cessation first.
    pub async fn find_ex_peps_approaching_downgrade(
        &self,
        threshold_date: NaiveDate,
    ) -> KycRiskResult<Vec<DowngradeCandidate>> {
        let years = self.settings.downgrade_period_years;
        let mut candidates: Vec<DowngradeCandidate> = self
            .peps
            .find_former_ceased_on_or_before(threshold_date)
            .await?
            .into_iter()
            .filter_map(|p| match p.status() {
                PepStatus::PepFormer { cessation_date } => Some(DowngradeCandidate {
                    dossier_id: p.dossier_id,
                    cessation_date,
                    downgrade_date: p.downgrade_date(years)?,
                }),
                _ => None,
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.cessation_date
                .cmp(&b.cessation_date)
                .then(a.dossier_id.cmp(&b.dossier_id))
        });
        Ok(candidates)
    }

    /// Cutoff such that a former PEP ceased on or before it reaches the end of
    /// its cooling-off period within `downgrade_notice_days` of `today`.
    pub fn downgrade_threshold(&self, today: NaiveDate) -> KycRiskResult<NaiveDate> {
        let months = downgrade_period_months(self.settings.downgrade_period_years);
        today
            .checked_add_days(Days::new(u64::from(self.settings.downgrade_notice_days)))
            .zip(months)
            .and_then(|(d, m)| d.checked_sub_months(Months::new(m)))
            .ok_or_else(|| KycRiskError::validation("today", "downgrade threshold out of range"))
    }

    pub async fn approaching_downgrade(&self, today: NaiveDate) -> KycRiskResult<Vec<DowngradeCandidate>> {
        let threshold = self.downgrade_threshold(today)?;
        self.find_ex_peps_approaching_downgrade(threshold).await
    }

    /// PEPs whose next review date has arrived, earliest first.
    pub async fn find_pending_reviews(&self, date: NaiveDate) -> KycRiskResult<Vec<ReviewDue>> {
        let mut reviews: Vec<ReviewDue> = self
            .peps
            .find_reviews_due(date)
            .await?
            .into_iter()
            .filter_map(|p| {
                Some(ReviewDue {
                    dossier_id: p.dossier_id,
                    pep_type: p.pep_type?,
                    review_date: p.next_review_date?,
                })
            })
            .collect();
        reviews.sort_by(|a, b| {
            a.review_date
                .cmp(&b.review_date)
                .then(a.dossier_id.cmp(&b.dossier_id))
        });
        Ok(reviews)
    }

    /// Move every eligible PEP_FORMER record to NOT_PEP. Per-record failures
    /// are logged and counted; only a failed candidate query fails the sweep.
    #[instrument(skip(self))]
    pub async fn run_downgrade_sweep(&self, today: NaiveDate) -> KycRiskResult<DowngradeSweepReport> {
        let years = self.settings.downgrade_period_years;
        let cutoff = downgrade_period_months(years)
            .and_then(|m| today.checked_sub_months(Months::new(m)))
            .ok_or_else(|| KycRiskError::validation("today", "downgrade cutoff out of range"))?;
        let candidates = self
            .peps
            .find_former_ceased_on_or_before(cutoff)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to query former PEPs"))?;

        let mut report = DowngradeSweepReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        for candidate in candidates {
            let dossier_id = candidate.dossier_id;
            match self.downgrade_one(dossier_id, today).await {
                Ok(true) => report.downgraded.push(dossier_id),
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(%dossier_id, error = %e, "Failed to downgrade former PEP");
                    report.errors += 1;
                }
            }
        }

        if report.downgraded.is_empty() {
            debug!(candidates = report.candidates, errors = report.errors, "PEP downgrade sweep complete, no changes");
        } else {
            info!(
                candidates = report.candidates,
                downgraded = report.downgraded.len(),
                skipped = report.skipped,
                errors = report.errors,
                "Completed PEP downgrade sweep"
            );
        }
        Ok(report)
    }

    /// Re-reads the record so a concurrent run that already downgraded it is
    /// skipped rather than failed. The write is conditional on the version
    /// read here, so a reclassification or a racing sweep wins and this
    /// record is skipped.
    async fn downgrade_one(&self, dossier_id: DossierId, today: NaiveDate) -> KycRiskResult<bool> {
        let years = self.settings.downgrade_period_years;
        let Some(mut info) = self.peps.find(dossier_id).await? else {
            return Ok(false);
        };
        if !info.is_downgrade_eligible(today, years) {
            return Ok(false);
        }
        info.downgrade(today, years)?;
        Ok(self.try_commit(info, "former pep downgraded").await?.is_some())
    }

    /// Send a review alert for every PEP whose review date has arrived.
    #[instrument(skip(self, alerts))]
    pub async fn run_review_sweep(
        &self,
        today: NaiveDate,
        alerts: &dyn AlertSink,
    ) -> KycRiskResult<ReviewSweepReport> {
        let reviews = self
            .find_pending_reviews(today)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to query pending PEP reviews"))?;

        let mut report = ReviewSweepReport::default();
        for review in &reviews {
            match alerts.pep_review_due(review).await {
                Ok(()) => report.alerts_sent += 1,
                Err(e) => {
                    warn!(dossier_id = %review.dossier_id, error = %e, "Failed to send PEP review alert");
                    report.errors += 1;
                }
            }
        }
        report.reviews = reviews;

        info!(
            reviews = report.reviews.len(),
            alerts_sent = report.alerts_sent,
            errors = report.errors,
            "Completed PEP review sweep"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::testing::FailingAlertSink;
    use crate::alerts::{AlertRecord, RecordingAlertSink};
    use crate::dossier::{Dossier, DossierStatus};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup() -> (Arc<InMemoryStore>, PepStatusTracker) {
        let store = Arc::new(InMemoryStore::new());
        let tracker = PepStatusTracker::new(store.clone(), store.clone(), PepSettings::new(5));
        (store, tracker)
    }

    async fn dossier(store: &InMemoryStore) -> DossierId {
        let id = Uuid::new_v4();
        DossierStore::save(store, &Dossier::new(id, "Subject", DossierStatus::UnderReview))
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_classify_flags_dossier() {
        let (store, tracker) = setup().await;
        let id = dossier(&store).await;
        tracker
            .classify(id, PepType::PepForeign, PepDetails::default(), date(2026, 1, 1))
            .await
            .unwrap();
        let d = DossierStore::get(store.as_ref(), id).await.unwrap().unwrap();
        assert!(d.requires_reevaluation);
        assert_eq!(tracker.risk_factor(id).await.unwrap().raw_score(), rust_decimal_macros::dec!(100));
    }

    #[tokio::test]
    async fn test_unknown_dossier_scores_not_pep() {
        let (_store, tracker) = setup().await;
        assert_eq!(
            tracker.risk_factor(Uuid::new_v4()).await.unwrap(),
            PepRiskFactor::not_pep()
        );
    }

    #[tokio::test]
    async fn test_cessation_on_unclassified_dossier_not_found() {
        let (store, tracker) = setup().await;
        let id = dossier(&store).await;
        let err = tracker
            .record_cessation(id, date(2026, 1, 1), date(2026, 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, KycRiskError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_downgrade_threshold_uses_notice_window() {
        let (_store, tracker) = setup().await;
        // 2026-10-17 + 90 days = 2027-01-15, minus 5 years
        assert_eq!(
            tracker.downgrade_threshold(date(2026, 10, 17)).unwrap(),
            date(2022, 1, 15)
        );
    }

    #[tokio::test]
    async fn test_pending_reviews_ordered_by_date() {
        let (store, tracker) = setup().await;
        let a = dossier(&store).await;
        let b = dossier(&store).await;
        tracker
            .classify(a, PepType::PepDomestic, PepDetails::default(), date(2025, 3, 1))
            .await
            .unwrap();
        tracker
            .classify(b, PepType::PepFamily, PepDetails::default(), date(2025, 1, 1))
            .await
            .unwrap();

        let due = tracker.find_pending_reviews(date(2026, 2, 1)).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].dossier_id, b);

        let due = tracker.find_pending_reviews(date(2026, 3, 1)).await.unwrap();
        assert_eq!(due.iter().map(|r| r.dossier_id).collect::<Vec<_>>(), vec![b, a]);
    }

    #[tokio::test]
    async fn test_review_sweep_sends_alerts() {
        let (store, tracker) = setup().await;
        let id = dossier(&store).await;
        tracker
            .classify(id, PepType::PepAssociate, PepDetails::default(), date(2025, 1, 1))
            .await
            .unwrap();
        let sink = RecordingAlertSink::new();
        let report = tracker.run_review_sweep(date(2026, 1, 1), &sink).await.unwrap();
        assert_eq!(report.alerts_sent, 1);
        assert!(matches!(
            sink.records().await.as_slice(),
            [AlertRecord::PepReview(r)] if r.pep_type == PepType::PepAssociate
        ));
    }

    #[tokio::test]
    async fn test_completed_review_leaves_queue() {
        let (store, tracker) = setup().await;
        let id = dossier(&store).await;
        tracker
            .classify(id, PepType::PepDomestic, PepDetails::default(), date(2025, 1, 1))
            .await
            .unwrap();
        tracker
            .complete_review(id, DecisionOutcome::Approved, Principal::new("co-1"), date(2026, 1, 2))
            .await
            .unwrap();
        assert!(tracker
            .find_pending_reviews(date(2026, 6, 1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_downgrade_sweep_is_idempotent() {
        let (store, tracker) = setup().await;
        let id = dossier(&store).await;
        tracker
            .classify(id, PepType::PepDomestic, PepDetails::default(), date(2015, 1, 1))
            .await
            .unwrap();
        tracker
            .record_cessation(id, date(2020, 6, 1), date(2020, 6, 1))
            .await
            .unwrap();
        let flagged = DossierStore::get(store.as_ref(), id).await.unwrap().unwrap();
        store.clear_reevaluation(id, flagged.flag_version).await.unwrap();

        let first = tracker.run_downgrade_sweep(date(2025, 6, 2)).await.unwrap();
        assert_eq!(first.downgraded, vec![id]);
        let second = tracker.run_downgrade_sweep(date(2025, 6, 2)).await.unwrap();
        assert!(second.downgraded.is_empty());
        assert_eq!(tracker.get(id).await.unwrap().status(), PepStatus::NotPep);
        assert!(DossierStore::get(store.as_ref(), id)
            .await
            .unwrap()
            .unwrap()
            .requires_reevaluation);
    }

    async fn former_pep(store: &InMemoryStore, tracker: &PepStatusTracker, ceased: NaiveDate) -> DossierId {
        let id = dossier(store).await;
        tracker
            .classify(id, PepType::PepDomestic, PepDetails::default(), date(2015, 1, 1))
            .await
            .unwrap();
        tracker.record_cessation(id, ceased, ceased).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_review_sweep_survives_failed_delivery() {
        let (store, tracker) = setup().await;
        let a = dossier(&store).await;
        let b = dossier(&store).await;
        let c = dossier(&store).await;
        for (id, on) in [(a, date(2025, 1, 1)), (b, date(2025, 1, 2)), (c, date(2025, 1, 3))] {
            tracker
                .classify(id, PepType::PepDomestic, PepDetails::default(), on)
                .await
                .unwrap();
        }
        let sink = FailingAlertSink::for_dossier(b);
        let report = tracker.run_review_sweep(date(2026, 2, 1), &sink).await.unwrap();

        assert_eq!(report.reviews.len(), 3);
        assert_eq!(report.alerts_sent, 2);
        assert_eq!(report.errors, 1);
        let delivered: Vec<DossierId> = sink
            .delivered
            .records()
            .await
            .into_iter()
            .filter_map(|r| match r {
                AlertRecord::PepReview(review) => Some(review.dossier_id),
                AlertRecord::Document(_) => None,
            })
            .collect();
        assert_eq!(delivered, vec![a, c]);
    }

    /// Rejects conditional writes for one dossier.
    struct BrokenPeps {
        inner: Arc<InMemoryStore>,
        broken: DossierId,
    }

    #[async_trait]
    impl PepRepository for BrokenPeps {
        async fn find(&self, dossier_id: DossierId) -> KycRiskResult<Option<PepInformation>> {
            self.inner.find(dossier_id).await
        }

        async fn save(&self, info: &PepInformation) -> KycRiskResult<()> {
            PepRepository::save(self.inner.as_ref(), info).await
        }

        async fn save_if_version(&self, info: &PepInformation, expected_version: u64) -> KycRiskResult<bool> {
            if info.dossier_id == self.broken {
                return Err(KycRiskError::transient("pep store", "write timeout"));
            }
            self.inner.save_if_version(info, expected_version).await
        }

        async fn find_former_ceased_on_or_before(&self, cutoff: NaiveDate) -> KycRiskResult<Vec<PepInformation>> {
            self.inner.find_former_ceased_on_or_before(cutoff).await
        }

        async fn find_reviews_due(&self, date: NaiveDate) -> KycRiskResult<Vec<PepInformation>> {
            self.inner.find_reviews_due(date).await
        }
    }

    #[tokio::test]
    async fn test_downgrade_sweep_continues_past_failed_record() {
        let (store, tracker) = setup().await;
        let a = former_pep(&store, &tracker, date(2020, 1, 1)).await;
        let b = former_pep(&store, &tracker, date(2020, 2, 1)).await;
        let c = former_pep(&store, &tracker, date(2020, 3, 1)).await;

        let broken = PepStatusTracker::new(
            Arc::new(BrokenPeps {
                inner: store.clone(),
                broken: b,
            }),
            store.clone(),
            PepSettings::new(5),
        );
        let mut report = broken.run_downgrade_sweep(date(2025, 6, 1)).await.unwrap();
        report.downgraded.sort();
        let mut expected = vec![a, c];
        expected.sort();

        assert_eq!(report.candidates, 3);
        assert_eq!(report.downgraded, expected);
        assert_eq!(report.errors, 1);
        assert!(matches!(tracker.get(b).await.unwrap().status(), PepStatus::PepFormer { .. }));
    }

    /// Hands out the stored record, then reclassifies the subject behind the
    /// caller's back once, the way a concurrent screening hit would.
    struct ReclassifiedMidway {
        inner: Arc<InMemoryStore>,
        armed: AtomicBool,
    }

    #[async_trait]
    impl PepRepository for ReclassifiedMidway {
        async fn find(&self, dossier_id: DossierId) -> KycRiskResult<Option<PepInformation>> {
            let found = self.inner.find(dossier_id).await?;
            if self.armed.swap(false, Ordering::SeqCst) {
                if let Some(mut rival) = found.clone() {
                    rival.classify(PepType::PepForeign, PepDetails::default(), date(2025, 6, 1), 12)?;
                    self.inner.save_if_version(&rival, rival.version).await?;
                }
            }
            Ok(found)
        }

        async fn save(&self, info: &PepInformation) -> KycRiskResult<()> {
            PepRepository::save(self.inner.as_ref(), info).await
        }

        async fn save_if_version(&self, info: &PepInformation, expected_version: u64) -> KycRiskResult<bool> {
            self.inner.save_if_version(info, expected_version).await
        }

        async fn find_former_ceased_on_or_before(&self, cutoff: NaiveDate) -> KycRiskResult<Vec<PepInformation>> {
            self.inner.find_former_ceased_on_or_before(cutoff).await
        }

        async fn find_reviews_due(&self, date: NaiveDate) -> KycRiskResult<Vec<PepInformation>> {
            self.inner.find_reviews_due(date).await
        }
    }

    #[tokio::test]
    async fn test_downgrade_does_not_overwrite_concurrent_reclassification() {
        let (store, tracker) = setup().await;
        let id = former_pep(&store, &tracker, date(2020, 1, 1)).await;
        let racing = PepStatusTracker::new(
            Arc::new(ReclassifiedMidway {
                inner: store.clone(),
                armed: AtomicBool::new(true),
            }),
            store.clone(),
            PepSettings::new(5),
        );

        let report = racing.run_downgrade_sweep(date(2025, 6, 1)).await.unwrap();
        assert!(report.downgraded.is_empty());
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors, 0);
        assert_eq!(
            tracker.get(id).await.unwrap().status(),
            PepStatus::PepActive {
                pep_type: PepType::PepForeign
            }
        );
    }

    #[tokio::test]
    async fn test_stale_update_is_a_conflict() {
        let (store, tracker) = setup().await;
        let id = dossier(&store).await;
        tracker
            .classify(id, PepType::PepDomestic, PepDetails::default(), date(2025, 1, 1))
            .await
            .unwrap();
        let racing = PepStatusTracker::new(
            Arc::new(ReclassifiedMidway {
                inner: store.clone(),
                armed: AtomicBool::new(true),
            }),
            store.clone(),
            PepSettings::new(5),
        );

        let err = racing
            .declassify(id, date(2025, 6, 1), "false positive")
            .await
            .unwrap_err();
        assert!(matches!(err, KycRiskError::Conflict { .. }));
        assert!(tracker.get(id).await.unwrap().is_pep);
    }

    #[tokio::test]
    async fn test_commits_bump_version() {
        let (store, tracker) = setup().await;
        let id = dossier(&store).await;
        let info = tracker
            .classify(id, PepType::PepDomestic, PepDetails::default(), date(2025, 1, 1))
            .await
            .unwrap();
        assert_eq!(info.version, 1);
        let info = tracker
            .record_cessation(id, date(2025, 3, 1), date(2025, 3, 1))
            .await
            .unwrap();
        assert_eq!(info.version, 2);
        assert_eq!(tracker.get(id).await.unwrap(), info);
    }
}
