use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::documents::ExpiryAlert;
use crate::pep::ReviewDue;
use crate::KycRiskResult;

/// Notification collaborator. Formatting and delivery channels live behind
/// this trait.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn document_alert(&self, alert: &ExpiryAlert) -> KycRiskResult<()>;

    async fn pep_review_due(&self, review: &ReviewDue) -> KycRiskResult<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertRecord {
    Document(ExpiryAlert),
    PepReview(ReviewDue),
}

/// Writes each alert as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn document_alert(&self, alert: &ExpiryAlert) -> KycRiskResult<()> {
        info!(
            target: "alerts",
            document_id = %alert.document_id,
            dossier_id = %alert.dossier_id,
            severity = ?alert.severity,
            days_remaining = alert.days_remaining,
            "Document expiry alert"
        );
        Ok(())
    }

    async fn pep_review_due(&self, review: &ReviewDue) -> KycRiskResult<()> {
        info!(
            target: "alerts",
            dossier_id = %review.dossier_id,
            pep_type = ?review.pep_type,
            review_date = %review.review_date,
            "PEP review due"
        );
        Ok(())
    }
}

/// Keeps every alert in memory, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    records: Mutex<Vec<AlertRecord>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AlertRecord> {
        self.records.lock().await.clone()
    }

    pub async fn document_alerts(&self) -> Vec<ExpiryAlert> {
        self.records
            .lock()
            .await
            .iter()
            .filter_map(|r| match r {
                AlertRecord::Document(a) => Some(a.clone()),
                AlertRecord::PepReview(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn document_alert(&self, alert: &ExpiryAlert) -> KycRiskResult<()> {
        self.records
            .lock()
            .await
            .push(AlertRecord::Document(alert.clone()));
        Ok(())
    }

    async fn pep_review_due(&self, review: &ReviewDue) -> KycRiskResult<()> {
        self.records
            .lock()
            .await
            .push(AlertRecord::PepReview(review.clone()));
        Ok(())
    }
}
