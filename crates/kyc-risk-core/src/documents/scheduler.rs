use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use super::{AlertSeverity, DocumentEvidence, DocumentStatus, DueDiligenceDocument, ExpiryAlert};
use crate::alerts::AlertSink;
use crate::error::KycRiskError;
use crate::settings::DocumentSettings;
use crate::store::{DocumentStore, DossierStore};
use crate::types::DossierId;
use crate::KycRiskResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpirationSweepReport {
    /// Documents this run moved to EXPIRED. A document appears here in
    /// exactly one run.
    pub newly_expired: Vec<DueDiligenceDocument>,
    /// Candidates another run had already expired.
    pub skipped: usize,
    pub errors: usize,
    /// Documents expired by this run whose dossier could not be flagged for
    /// re-evaluation. They are still listed in `newly_expired`.
    #[serde(default)]
    pub flag_errors: usize,
}

impl ExpirationSweepReport {
    /// CRITICAL alert intents for the newly expired documents.
    pub fn alerts(&self, today: NaiveDate) -> Vec<ExpiryAlert> {
        self.newly_expired
            .iter()
            .filter_map(|doc| {
                let expiry_date = doc.expiry_date?;
                Some(ExpiryAlert {
                    document_id: doc.document_id.clone(),
                    dossier_id: doc.dossier_id,
                    severity: AlertSeverity::Critical,
                    days_remaining: (expiry_date - today).num_days(),
                    expiry_date,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpcomingExpirySweepReport {
    /// One alert per document, at the highest severity that applies,
    /// soonest expiry first.
    pub alerts: Vec<ExpiryAlert>,
    pub delivered: usize,
    pub errors: usize,
}

/// Daily document jobs: expire lapsed evidence and warn ahead of expiry.
/// Both sweeps are safe to re-run and to race with themselves.
pub struct DocumentLifecycleScheduler {
    documents: Arc<dyn DocumentStore>,
    dossiers: Arc<dyn DossierStore>,
    settings: DocumentSettings,
}

impl DocumentLifecycleScheduler {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        dossiers: Arc<dyn DossierStore>,
        settings: DocumentSettings,
    ) -> Self {
        Self {
            documents,
            dossiers,
            settings,
        }
    }

    pub fn settings(&self) -> &DocumentSettings {
        &self.settings
    }

    /// Severity for a document `days_remaining` days from expiry, if inside
    /// the warning window.
    pub fn severity_for(&self, days_remaining: i64) -> Option<AlertSeverity> {
        match days_remaining {
            d if d < 0 => None,
            d if d <= i64::from(self.settings.urgent_window_days) => Some(AlertSeverity::High),
            d if d <= i64::from(self.settings.expiring_window_days) => Some(AlertSeverity::Medium),
            _ => None,
        }
    }

    /// Transition every lapsed, not yet EXPIRED document to EXPIRED and flag
    /// its dossier for re-evaluation.
    #[instrument(skip(self))]
    pub async fn run_expiration_sweep(&self, today: NaiveDate) -> KycRiskResult<ExpirationSweepReport> {
        // expiry_date < today, i.e. due by yesterday
        let cutoff = today
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| KycRiskError::validation("today", "date out of range"))?;
        let candidates = self
            .documents
            .find_unexpired_due_by(cutoff)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to query lapsed documents"))?;

        let mut report = ExpirationSweepReport::default();
        for doc in candidates {
            let changed = self
                .documents
                .transition_status(&doc.document_id, doc.status, DocumentStatus::Expired)
                .await;
            match changed {
                Ok(true) => {}
                Ok(false) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(
                        document_id = %doc.document_id,
                        dossier_id = %doc.dossier_id,
                        error = %e,
                        "Failed to expire document"
                    );
                    report.errors += 1;
                    continue;
                }
            }
            info!(
                document_id = %doc.document_id,
                dossier_id = %doc.dossier_id,
                expiry_date = ?doc.expiry_date,
                "Document expired"
            );
            // The transition is committed; this run is the only one that will
            // ever report the document, whatever happens to the flag.
            if let Err(e) = self
                .dossiers
                .flag_for_reevaluation(doc.dossier_id, "document expired")
                .await
            {
                error!(
                    document_id = %doc.document_id,
                    dossier_id = %doc.dossier_id,
                    error = %e,
                    "Failed to flag dossier for re-evaluation after expiry"
                );
                report.flag_errors += 1;
            }
            report.newly_expired.push(DueDiligenceDocument {
                status: DocumentStatus::Expired,
                ..doc
            });
        }
        report
            .newly_expired
            .sort_by(|a, b| a.expiry_date.cmp(&b.expiry_date).then_with(|| a.document_id.cmp(&b.document_id)));

        if report.newly_expired.is_empty() && report.errors == 0 && report.flag_errors == 0 {
            debug!(skipped = report.skipped, "Expiration sweep complete, nothing to expire");
        } else {
            info!(
                newly_expired = report.newly_expired.len(),
                skipped = report.skipped,
                errors = report.errors,
                flag_errors = report.flag_errors,
                "Completed document expiration sweep"
            );
        }
        Ok(report)
    }

    /// Alert intents for documents expiring within the warning window.
    /// A document inside the urgent window is reported at HIGH only.
    pub async fn find_upcoming_expiries(&self, today: NaiveDate) -> KycRiskResult<Vec<ExpiryAlert>> {
        let horizon = today
            .checked_add_days(Days::new(u64::from(self.settings.expiring_window_days)))
            .ok_or_else(|| KycRiskError::validation("today", "date out of range"))?;
        let mut alerts: Vec<ExpiryAlert> = self
            .documents
            .find_unexpired_due_by(horizon)
            .await?
            .into_iter()
            .filter_map(|doc| {
                let expiry_date = doc.expiry_date?;
                let days_remaining = (expiry_date - today).num_days();
                let severity = self.severity_for(days_remaining)?;
                Some(ExpiryAlert {
                    document_id: doc.document_id,
                    dossier_id: doc.dossier_id,
                    severity,
                    days_remaining,
                    expiry_date,
                })
            })
            .collect();
        alerts.sort_by(|a, b| {
            a.days_remaining
                .cmp(&b.days_remaining)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        Ok(alerts)
    }

    /// Mark documents inside the warning window EXPIRING and hand one alert
    /// per document to `alerts`. Delivery failures are logged and counted.
    #[instrument(skip(self, alerts))]
    pub async fn run_upcoming_expiry_sweep(
        &self,
        today: NaiveDate,
        alerts: &dyn AlertSink,
    ) -> KycRiskResult<UpcomingExpirySweepReport> {
        let intents = self
            .find_upcoming_expiries(today)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to query upcoming document expiries"))?;

        let mut report = UpcomingExpirySweepReport::default();
        for alert in &intents {
            if let Err(e) = self
                .documents
                .transition_status(&alert.document_id, DocumentStatus::Active, DocumentStatus::Expiring)
                .await
            {
                warn!(document_id = %alert.document_id, error = %e, "Failed to mark document expiring");
                report.errors += 1;
            }
            match alerts.document_alert(alert).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        document_id = %alert.document_id,
                        dossier_id = %alert.dossier_id,
                        severity = ?alert.severity,
                        error = %e,
                        "Failed to deliver expiry alert"
                    );
                    report.errors += 1;
                }
            }
        }
        report.alerts = intents;

        info!(
            alerts = report.alerts.len(),
            high = report.alerts.iter().filter(|a| a.severity == AlertSeverity::High).count(),
            delivered = report.delivered,
            errors = report.errors,
            "Completed upcoming expiry sweep"
        );
        Ok(report)
    }

    /// Validity summary of a dossier's documents as of `today`, computed
    /// from dates rather than the stored status.
    pub async fn evidence_for(&self, dossier_id: DossierId, today: NaiveDate) -> KycRiskResult<DocumentEvidence> {
        let documents = self.documents.list_for_dossier(dossier_id).await?;
        Ok(DocumentEvidence::from_documents(
            &documents,
            today,
            self.settings.expiring_window_days,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::testing::FailingAlertSink;
    use crate::alerts::RecordingAlertSink;
    use crate::dossier::{Dossier, DossierStatus};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn doc(id: &str, dossier_id: DossierId, expiry: NaiveDate) -> DueDiligenceDocument {
        DueDiligenceDocument {
            document_id: id.to_string(),
            dossier_id,
            document_type: "passport".into(),
            issue_date: date(2020, 1, 1),
            expiry_date: Some(expiry),
            status: DocumentStatus::Active,
        }
    }

    async fn setup(docs: &[(&str, NaiveDate)]) -> (Arc<InMemoryStore>, DossierId) {
        let store = Arc::new(InMemoryStore::new());
        let dossier_id = Uuid::new_v4();
        DossierStore::save(store.as_ref(), &Dossier::new(dossier_id, "Subject", DossierStatus::UnderReview))
            .await
            .unwrap();
        for (id, expiry) in docs {
            DocumentStore::save(store.as_ref(), &doc(id, dossier_id, *expiry))
                .await
                .unwrap();
        }
        (store, dossier_id)
    }

    fn scheduler(documents: Arc<dyn DocumentStore>, dossiers: Arc<dyn DossierStore>) -> DocumentLifecycleScheduler {
        DocumentLifecycleScheduler::new(documents, dossiers, DocumentSettings::default())
    }

    #[tokio::test]
    async fn test_expiration_sweep_is_idempotent() {
        let today = date(2026, 10, 17);
        let (store, dossier_id) =
            setup(&[("lapsed", date(2026, 10, 16)), ("today", today), ("later", date(2027, 1, 1))]).await;
        let sched = scheduler(store.clone(), store.clone());

        let first = sched.run_expiration_sweep(today).await.unwrap();
        assert_eq!(
            first.newly_expired.iter().map(|d| d.document_id.as_str()).collect::<Vec<_>>(),
            vec!["lapsed"]
        );
        assert_eq!(first.newly_expired[0].status, DocumentStatus::Expired);

        let second = sched.run_expiration_sweep(today).await.unwrap();
        assert!(second.newly_expired.is_empty());

        let dossier = DossierStore::get(store.as_ref(), dossier_id).await.unwrap().unwrap();
        assert!(dossier.requires_reevaluation);
    }

    #[tokio::test]
    async fn test_expired_alerts_are_critical() {
        let today = date(2026, 10, 17);
        let (store, _) = setup(&[("lapsed", date(2026, 10, 10))]).await;
        let report = scheduler(store.clone(), store).run_expiration_sweep(today).await.unwrap();
        let alerts = report.alerts(today);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].days_remaining, -7);
    }

    #[tokio::test]
    async fn test_six_days_out_is_high_only() {
        let today = date(2026, 10, 17);
        let (store, _) = setup(&[("soon", date(2026, 10, 23))]).await;
        let sink = RecordingAlertSink::new();
        let report = scheduler(store.clone(), store.clone())
            .run_upcoming_expiry_sweep(today, &sink)
            .await
            .unwrap();

        let alerts = sink.document_alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::High);
        assert_eq!(alerts[0].days_remaining, 6);
        assert_eq!(report.alerts, alerts);

        let stored = DocumentStore::get(store.as_ref(), "soon").await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Expiring);
    }

    #[tokio::test]
    async fn test_window_boundaries() {
        let today = date(2026, 10, 17);
        let (store, _) = setup(&[
            ("d0", today),
            ("d7", date(2026, 10, 24)),
            ("d8", date(2026, 10, 25)),
            ("d30", date(2026, 11, 16)),
            ("d31", date(2026, 11, 17)),
        ])
        .await;
        let alerts = scheduler(store.clone(), store)
            .find_upcoming_expiries(today)
            .await
            .unwrap();
        let got: Vec<(&str, AlertSeverity)> = alerts
            .iter()
            .map(|a| (a.document_id.as_str(), a.severity))
            .collect();
        assert_eq!(
            got,
            vec![
                ("d0", AlertSeverity::High),
                ("d7", AlertSeverity::High),
                ("d8", AlertSeverity::Medium),
                ("d30", AlertSeverity::Medium),
            ]
        );
    }

    /// Fails status transitions for one document id.
    struct FlakyDocuments {
        inner: Arc<InMemoryStore>,
        broken: &'static str,
    }

    #[async_trait]
    impl DocumentStore for FlakyDocuments {
        async fn get(&self, document_id: &str) -> KycRiskResult<Option<DueDiligenceDocument>> {
            DocumentStore::get(self.inner.as_ref(), document_id).await
        }

        async fn save(&self, document: &DueDiligenceDocument) -> KycRiskResult<()> {
            DocumentStore::save(self.inner.as_ref(), document).await
        }

        async fn list_for_dossier(&self, dossier_id: DossierId) -> KycRiskResult<Vec<DueDiligenceDocument>> {
            self.inner.list_for_dossier(dossier_id).await
        }

        async fn find_unexpired_due_by(&self, date: NaiveDate) -> KycRiskResult<Vec<DueDiligenceDocument>> {
            self.inner.find_unexpired_due_by(date).await
        }

        async fn transition_status(
            &self,
            document_id: &str,
            expected: DocumentStatus,
            next: DocumentStatus,
        ) -> KycRiskResult<bool> {
            if document_id == self.broken {
                return Err(KycRiskError::transient("document store", "connection reset"));
            }
            self.inner.transition_status(document_id, expected, next).await
        }
    }

    /// Every call fails.
    struct UnreachableDocuments;

    #[async_trait]
    impl DocumentStore for UnreachableDocuments {
        async fn get(&self, _: &str) -> KycRiskResult<Option<DueDiligenceDocument>> {
            Err(KycRiskError::transient("document store", "unreachable"))
        }

        async fn save(&self, _: &DueDiligenceDocument) -> KycRiskResult<()> {
            Err(KycRiskError::transient("document store", "unreachable"))
        }

        async fn list_for_dossier(&self, _: DossierId) -> KycRiskResult<Vec<DueDiligenceDocument>> {
            Err(KycRiskError::transient("document store", "unreachable"))
        }

        async fn find_unexpired_due_by(&self, _: NaiveDate) -> KycRiskResult<Vec<DueDiligenceDocument>> {
            Err(KycRiskError::transient("document store", "unreachable"))
        }

        async fn transition_status(&self, _: &str, _: DocumentStatus, _: DocumentStatus) -> KycRiskResult<bool> {
            Err(KycRiskError::transient("document store", "unreachable"))
        }
    }

    #[tokio::test]
    async fn test_item_failure_does_not_abort_sweep() {
        let today = date(2026, 10, 17);
        let (store, _) = setup(&[("a", date(2026, 10, 1)), ("b", date(2026, 10, 2)), ("c", date(2026, 10, 3))]).await;
        let flaky = Arc::new(FlakyDocuments {
            inner: store.clone(),
            broken: "b",
        });
        let report = scheduler(flaky, store).run_expiration_sweep(today).await.unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(
            report.newly_expired.iter().map(|d| d.document_id.as_str()).collect::<Vec<_>>(),
            vec!["a", "c"]
        );
    }

    #[tokio::test]
    async fn test_expired_document_reported_even_if_dossier_flag_fails() {
        let today = date(2026, 10, 17);
        // no dossier record behind the document, so flagging fails
        let store = Arc::new(InMemoryStore::new());
        DocumentStore::save(store.as_ref(), &doc("orphan", Uuid::new_v4(), date(2026, 10, 1)))
            .await
            .unwrap();
        let sched = scheduler(store.clone(), store.clone());

        let first = sched.run_expiration_sweep(today).await.unwrap();
        assert_eq!(
            first.newly_expired.iter().map(|d| d.document_id.as_str()).collect::<Vec<_>>(),
            vec!["orphan"]
        );
        assert_eq!(first.flag_errors, 1);
        assert_eq!(first.errors, 0);
        assert_eq!(first.alerts(today).len(), 1);

        let second = sched.run_expiration_sweep(today).await.unwrap();
        assert!(second.newly_expired.is_empty());
        let stored = DocumentStore::get(store.as_ref(), "orphan").await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Expired);
    }

    #[tokio::test]
    async fn test_upcoming_sweep_survives_failed_delivery() {
        let today = date(2026, 10, 17);
        let (store, _) = setup(&[
            ("a", date(2026, 10, 20)),
            ("b", date(2026, 10, 21)),
            ("c", date(2026, 11, 5)),
        ])
        .await;
        let sink = FailingAlertSink::for_document("b");
        let report = scheduler(store.clone(), store.clone())
            .run_upcoming_expiry_sweep(today, &sink)
            .await
            .unwrap();

        assert_eq!(report.alerts.len(), 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.errors, 1);
        assert_eq!(
            sink.delivered
                .document_alerts()
                .await
                .iter()
                .map(|a| a.document_id.clone())
                .collect::<Vec<_>>(),
            vec!["a".to_string(), "c".to_string()]
        );
        // the status change does not depend on delivery
        let stored = DocumentStore::get(store.as_ref(), "b").await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Expiring);
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_sweep_once() {
        let store = Arc::new(InMemoryStore::new());
        let sched = scheduler(Arc::new(UnreachableDocuments), store);
        let err = sched.run_expiration_sweep(date(2026, 10, 17)).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_evidence_for_dossier() {
        let today = date(2026, 10, 17);
        let (store, dossier_id) = setup(&[
            ("old", date(2026, 1, 1)),
            ("soon", date(2026, 10, 30)),
            ("fine", date(2028, 1, 1)),
        ])
        .await;
        let evidence = scheduler(store.clone(), store)
            .evidence_for(dossier_id, today)
            .await
            .unwrap();
        assert_eq!(
            evidence,
            DocumentEvidence {
                total: 3,
                active: 1,
                expiring: 1,
                expired: 1,
            }
        );
        assert!(!evidence.is_complete());
    }
}
