pub mod scheduler;

pub use scheduler::{DocumentLifecycleScheduler, ExpirationSweepReport, UpcomingExpirySweepReport};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::KycRiskError;
use crate::types::{DossierId, Score};
use crate::KycRiskResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Active,
    Expiring,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Medium,
    High,
    Critical,
}

/// Supporting evidence attached to a dossier. Never auto-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueDiligenceDocument {
    pub document_id: String,
    pub dossier_id: DossierId,
    pub document_type: String,
    pub issue_date: NaiveDate,
    /// `None` for documents that do not lapse.
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    /// Last status written by the lifecycle scheduler.
    #[serde(default = "default_status")]
    pub status: DocumentStatus,
}

fn default_status() -> DocumentStatus {
    DocumentStatus::Active
}

/// Intent to notify about a lapsing or lapsed document. Delivery belongs to
/// the alert collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiryAlert {
    pub document_id: String,
    pub dossier_id: DossierId,
    pub severity: AlertSeverity,
    /// Negative once the document has lapsed.
    pub days_remaining: i64,
    pub expiry_date: NaiveDate,
}

impl DueDiligenceDocument {
    pub fn validate(&self) -> KycRiskResult<()> {
        if self.document_id.trim().is_empty() {
            return Err(KycRiskError::validation("document_id", "must not be empty"));
        }
        if let Some(expiry) = self.expiry_date {
            if expiry < self.issue_date {
                return Err(KycRiskError::validation(
                    "expiry_date",
                    format!("{} precedes issue date {}", expiry, self.issue_date),
                ));
            }
        }
        Ok(())
    }

    pub fn days_remaining(&self, today: NaiveDate) -> Option<i64> {
        self.expiry_date.map(|e| (e - today).num_days())
    }

    /// Status as of `today`; a document is still valid on its expiry date.
    pub fn status_on(&self, today: NaiveDate, expiring_window_days: u32) -> DocumentStatus {
        match self.days_remaining(today) {
            Some(days) if days < 0 => DocumentStatus::Expired,
            Some(days) if days <= i64::from(expiring_window_days) => DocumentStatus::Expiring,
            _ => DocumentStatus::Active,
        }
    }
}

/// Per-dossier summary of document validity, fed to the `documents`
/// scoring category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEvidence {
    pub total: u32,
    pub active: u32,
    pub expiring: u32,
    pub expired: u32,
}

impl DocumentEvidence {
    pub fn from_documents(
        documents: &[DueDiligenceDocument],
        today: NaiveDate,
        expiring_window_days: u32,
    ) -> Self {
        let mut evidence = DocumentEvidence::default();
        for doc in documents {
            evidence.total += 1;
            match doc.status_on(today, expiring_window_days) {
                DocumentStatus::Active => evidence.active += 1,
                DocumentStatus::Expiring => evidence.expiring += 1,
                DocumentStatus::Expired => evidence.expired += 1,
            }
        }
        evidence
    }

    /// An evaluation is only complete while no evidence has lapsed.
    pub fn is_complete(&self) -> bool {
        self.expired == 0
    }

    pub fn raw_score(&self) -> Score {
        let score = Decimal::from(self.expired) * dec!(50) + Decimal::from(self.expiring) * dec!(15);
        score.min(dec!(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn doc(expiry: Option<NaiveDate>) -> DueDiligenceDocument {
        DueDiligenceDocument {
            document_id: "passport-1".into(),
            dossier_id: Uuid::new_v4(),
            document_type: "passport".into(),
            issue_date: date(2020, 1, 1),
            expiry_date: expiry,
            status: DocumentStatus::Active,
        }
    }

    #[test]
    fn test_status_is_function_of_date() {
        let d = doc(Some(date(2026, 10, 31)));
        assert_eq!(d.status_on(date(2026, 9, 1), 30), DocumentStatus::Active);
        assert_eq!(d.status_on(date(2026, 10, 1), 30), DocumentStatus::Expiring);
        assert_eq!(d.status_on(date(2026, 10, 31), 30), DocumentStatus::Expiring);
        assert_eq!(d.status_on(date(2026, 11, 1), 30), DocumentStatus::Expired);
    }

    #[test]
    fn test_non_expiring_document_stays_active() {
        assert_eq!(doc(None).status_on(date(2099, 1, 1), 30), DocumentStatus::Active);
    }

    #[test]
    fn test_expiry_before_issue_rejected() {
        assert!(doc(Some(date(2019, 1, 1))).validate().is_err());
    }

    #[test]
    fn test_evidence_summary_and_score() {
        let today = date(2026, 10, 17);
        let docs = vec![
            doc(Some(date(2026, 10, 1))),
            doc(Some(date(2026, 10, 20))),
            doc(Some(date(2030, 1, 1))),
            doc(None),
        ];
        let evidence = DocumentEvidence::from_documents(&docs, today, 30);
        assert_eq!(evidence.total, 4);
        assert_eq!(evidence.expired, 1);
        assert_eq!(evidence.expiring, 1);
        assert_eq!(evidence.active, 2);
        assert!(!evidence.is_complete());
        assert_eq!(evidence.raw_score(), dec!(65));
    }

    #[test]
    fn test_evidence_score_capped() {
        let evidence = DocumentEvidence { total: 3, active: 0, expiring: 0, expired: 3 };
        assert_eq!(evidence.raw_score(), dec!(100));
    }
}
