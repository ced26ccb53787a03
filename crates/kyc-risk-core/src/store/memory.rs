use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{DocumentStore, DossierStore, EvaluationStore, OverrideStore, PepRepository};
use crate::documents::{DocumentStatus, DueDiligenceDocument};
use crate::dossier::{Dossier, DossierStatus};
use crate::error::KycRiskError;
use crate::evaluation::EvaluationRecord;
use crate::overrides::OverrideRecord;
use crate::pep::{PepInformation, PepType};
use crate::types::{DossierId, EvaluationId};
use crate::KycRiskResult;

/// Serializable image of an [`InMemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub dossiers: Vec<Dossier>,
    #[serde(default)]
    pub peps: Vec<PepInformation>,
    #[serde(default)]
    pub documents: Vec<DueDiligenceDocument>,
    #[serde(default)]
    pub evaluations: Vec<EvaluationRecord>,
    #[serde(default)]
    pub overrides: Vec<OverrideRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    dossiers: RwLock<BTreeMap<DossierId, Dossier>>,
    peps: RwLock<BTreeMap<DossierId, PepInformation>>,
    documents: RwLock<BTreeMap<String, DueDiligenceDocument>>,
    evaluations: RwLock<Vec<EvaluationRecord>>,
    overrides: RwLock<Vec<OverrideRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> KycRiskResult<Self> {
        for info in &snapshot.peps {
            info.validate()?;
        }
        for doc in &snapshot.documents {
            doc.validate()?;
        }
        Ok(InMemoryStore {
            dossiers: RwLock::new(
                snapshot
                    .dossiers
                    .into_iter()
                    .map(|d| (d.dossier_id, d))
                    .collect(),
            ),
            peps: RwLock::new(
                snapshot
                    .peps
                    .into_iter()
                    .map(|p| (p.dossier_id, p))
                    .collect(),
            ),
            documents: RwLock::new(
                snapshot
                    .documents
                    .into_iter()
                    .map(|d| (d.document_id.clone(), d))
                    .collect(),
            ),
            evaluations: RwLock::new(snapshot.evaluations),
            overrides: RwLock::new(snapshot.overrides),
        })
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            dossiers: self.dossiers.read().await.values().cloned().collect(),
            peps: self.peps.read().await.values().cloned().collect(),
            documents: self.documents.read().await.values().cloned().collect(),
            evaluations: self.evaluations.read().await.clone(),
            overrides: self.overrides.read().await.clone(),
        }
    }
}

#[async_trait]
impl DossierStore for InMemoryStore {
    async fn get(&self, dossier_id: DossierId) -> KycRiskResult<Option<Dossier>> {
        Ok(self.dossiers.read().await.get(&dossier_id).cloned())
    }

    async fn save(&self, dossier: &Dossier) -> KycRiskResult<()> {
        self.dossiers
            .write()
            .await
            .insert(dossier.dossier_id, dossier.clone());
        Ok(())
    }

    async fn list_by_status(&self, status: DossierStatus) -> KycRiskResult<Vec<Dossier>> {
        Ok(self
            .dossiers
            .read()
            .await
            .values()
            .filter(|d| d.status == status)
            .cloned()
            .collect())
    }

    async fn flag_for_reevaluation(&self, dossier_id: DossierId, reason: &str) -> KycRiskResult<()> {
        let mut dossiers = self.dossiers.write().await;
        let dossier = dossiers
            .get_mut(&dossier_id)
            .ok_or_else(|| KycRiskError::not_found("dossier", dossier_id))?;
        dossier.requires_reevaluation = true;
        dossier.flag_version += 1;
        if !dossier.reevaluation_reasons.iter().any(|r| r == reason) {
            dossier.reevaluation_reasons.push(reason.to_string());
        }
        Ok(())
    }

    async fn clear_reevaluation(&self, dossier_id: DossierId, observed_version: u64) -> KycRiskResult<bool> {
        let mut dossiers = self.dossiers.write().await;
        let dossier = dossiers
            .get_mut(&dossier_id)
            .ok_or_else(|| KycRiskError::not_found("dossier", dossier_id))?;
        if dossier.flag_version != observed_version {
            return Ok(false);
        }
        dossier.requires_reevaluation = false;
        dossier.reevaluation_reasons.clear();
        Ok(true)
    }
}

#[async_trait]
impl EvaluationStore for InMemoryStore {
    async fn append(&self, record: &EvaluationRecord) -> KycRiskResult<()> {
        let mut evaluations = self.evaluations.write().await;
        if evaluations
            .iter()
            .any(|e| e.evaluation_id == record.evaluation_id)
        {
            return Err(KycRiskError::validation(
                "evaluation_id",
                format!("evaluation {} already recorded", record.evaluation_id),
            ));
        }
        evaluations.push(record.clone());
        Ok(())
    }

    async fn get(&self, evaluation_id: EvaluationId) -> KycRiskResult<Option<EvaluationRecord>> {
        Ok(self
            .evaluations
            .read()
            .await
            .iter()
            .find(|e| e.evaluation_id == evaluation_id)
            .cloned())
    }

    async fn history(&self, dossier_id: DossierId) -> KycRiskResult<Vec<EvaluationRecord>> {
        Ok(self
            .evaluations
            .read()
            .await
            .iter()
            .filter(|e| e.dossier_id == dossier_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OverrideStore for InMemoryStore {
    async fn append(&self, record: &OverrideRecord) -> KycRiskResult<()> {
        self.overrides.write().await.push(record.clone());
        Ok(())
    }

    async fn for_evaluation(&self, evaluation_id: EvaluationId) -> KycRiskResult<Vec<OverrideRecord>> {
        Ok(self
            .overrides
            .read()
            .await
            .iter()
            .filter(|o| o.evaluation_id == evaluation_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PepRepository for InMemoryStore {
    async fn find(&self, dossier_id: DossierId) -> KycRiskResult<Option<PepInformation>> {
        Ok(self.peps.read().await.get(&dossier_id).cloned())
    }

    async fn save(&self, info: &PepInformation) -> KycRiskResult<()> {
        info.validate()?;
        self.peps.write().await.insert(info.dossier_id, info.clone());
        Ok(())
    }

    async fn save_if_version(&self, info: &PepInformation, expected_version: u64) -> KycRiskResult<bool> {
        info.validate()?;
        let mut peps = self.peps.write().await;
        let stored_version = peps.get(&info.dossier_id).map_or(0, |p| p.version);
        if stored_version != expected_version {
            return Ok(false);
        }
        peps.insert(
            info.dossier_id,
            PepInformation {
                version: expected_version + 1,
                ..info.clone()
            },
        );
        Ok(true)
    }

    async fn find_former_ceased_on_or_before(
        &self,
        cutoff: NaiveDate,
    ) -> KycRiskResult<Vec<PepInformation>> {
        Ok(self
            .peps
            .read()
            .await
            .values()
            .filter(|p| p.pep_type == Some(PepType::PepFormer))
            .filter(|p| p.details.cessation_date.is_some_and(|c| c <= cutoff))
            .cloned()
            .collect())
    }

    async fn find_reviews_due(&self, date: NaiveDate) -> KycRiskResult<Vec<PepInformation>> {
        Ok(self
            .peps
            .read()
            .await
            .values()
            .filter(|p| p.is_pep && p.next_review_date.is_some_and(|d| d <= date))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, document_id: &str) -> KycRiskResult<Option<DueDiligenceDocument>> {
        Ok(self.documents.read().await.get(document_id).cloned())
    }

    async fn save(&self, document: &DueDiligenceDocument) -> KycRiskResult<()> {
        document.validate()?;
        self.documents
            .write()
            .await
            .insert(document.document_id.clone(), document.clone());
        Ok(())
    }

    async fn list_for_dossier(&self, dossier_id: DossierId) -> KycRiskResult<Vec<DueDiligenceDocument>> {
        Ok(self
            .documents
            .read()
            .await
            .values()
            .filter(|d| d.dossier_id == dossier_id)
            .cloned()
            .collect())
    }

    async fn find_unexpired_due_by(&self, date: NaiveDate) -> KycRiskResult<Vec<DueDiligenceDocument>> {
        Ok(self
            .documents
            .read()
            .await
            .values()
            .filter(|d| d.status != DocumentStatus::Expired)
            .filter(|d| d.expiry_date.is_some_and(|e| e <= date))
            .cloned()
            .collect())
    }

    async fn transition_status(
        &self,
        document_id: &str,
        expected: DocumentStatus,
        next: DocumentStatus,
    ) -> KycRiskResult<bool> {
        let mut documents = self.documents.write().await;
        let doc = documents
            .get_mut(document_id)
            .ok_or_else(|| KycRiskError::not_found("document", document_id))?;
        if doc.status != expected {
            return Ok(false);
        }
        doc.status = next;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_transition_status_is_compare_and_set() {
        let store = InMemoryStore::new();
        let doc = DueDiligenceDocument {
            document_id: "doc-1".into(),
            dossier_id: Uuid::new_v4(),
            document_type: "passport".into(),
            issue_date: date(2020, 1, 1),
            expiry_date: Some(date(2025, 1, 1)),
            status: DocumentStatus::Active,
        };
        DocumentStore::save(&store, &doc).await.unwrap();
        assert!(store
            .transition_status("doc-1", DocumentStatus::Active, DocumentStatus::Expired)
            .await
            .unwrap());
        assert!(!store
            .transition_status("doc-1", DocumentStatus::Active, DocumentStatus::Expired)
            .await
            .unwrap());
        assert!(store
            .find_unexpired_due_by(date(2026, 1, 1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_flag_for_reevaluation_deduplicates_reasons() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        DossierStore::save(&store, &Dossier::new(id, "Acme", DossierStatus::UnderReview))
            .await
            .unwrap();
        store.flag_for_reevaluation(id, "pep status changed").await.unwrap();
        store.flag_for_reevaluation(id, "pep status changed").await.unwrap();
        let dossier = DossierStore::get(&store, id).await.unwrap().unwrap();
        assert!(dossier.requires_reevaluation);
        assert_eq!(dossier.reevaluation_reasons.len(), 1);

        let flagged = DossierStore::get(&store, id).await.unwrap().unwrap();
        assert_eq!(flagged.flag_version, 2);
        assert!(store.clear_reevaluation(id, 2).await.unwrap());
        let dossier = DossierStore::get(&store, id).await.unwrap().unwrap();
        assert!(!dossier.requires_reevaluation);
    }

    #[tokio::test]
    async fn test_clear_keeps_newer_flag() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        DossierStore::save(&store, &Dossier::new(id, "Acme", DossierStatus::UnderReview))
            .await
            .unwrap();
        store.flag_for_reevaluation(id, "document expired").await.unwrap();
        let observed = DossierStore::get(&store, id).await.unwrap().unwrap().flag_version;
        store.flag_for_reevaluation(id, "pep classification changed").await.unwrap();

        assert!(!store.clear_reevaluation(id, observed).await.unwrap());
        let dossier = DossierStore::get(&store, id).await.unwrap().unwrap();
        assert!(dossier.requires_reevaluation);
        assert_eq!(dossier.reevaluation_reasons.len(), 2);
    }

    #[tokio::test]
    async fn test_pep_save_if_version_is_compare_and_set() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        let info = PepInformation::not_pep(id);
        assert!(store.save_if_version(&info, 0).await.unwrap());
        let stored = store.find(id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);

        // a writer still holding version 0 loses
        assert!(!store.save_if_version(&info, 0).await.unwrap());
        assert!(store.save_if_version(&stored, 1).await.unwrap());
        assert_eq!(store.find(id).await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_flag_unknown_dossier_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .flag_for_reevaluation(Uuid::new_v4(), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, KycRiskError::NotFound { .. }));
    }
}
