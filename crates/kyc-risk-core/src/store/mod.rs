//! Repository traits for the persistence collaborators.
//!
//! The engine only depends on these capability sets; [`memory::InMemoryStore`]
//! implements all of them for tests, the CLI and single-process deployments.

pub mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::documents::{DocumentStatus, DueDiligenceDocument};
use crate::dossier::{Dossier, DossierStatus};
use crate::evaluation::EvaluationRecord;
use crate::overrides::OverrideRecord;
use crate::pep::PepInformation;
use crate::types::{DossierId, EvaluationId};
use crate::KycRiskResult;

#[async_trait]
pub trait DossierStore: Send + Sync {
    async fn get(&self, dossier_id: DossierId) -> KycRiskResult<Option<Dossier>>;

    async fn save(&self, dossier: &Dossier) -> KycRiskResult<()>;

    async fn list_by_status(&self, status: DossierStatus) -> KycRiskResult<Vec<Dossier>>;

    /// Mark prior evaluations as stale and bump `flag_version`.
    async fn flag_for_reevaluation(&self, dossier_id: DossierId, reason: &str) -> KycRiskResult<()>;

    /// Clear the flag only if `flag_version` still equals `observed_version`.
    /// Returns `false` when a newer flag is pending.
    async fn clear_reevaluation(&self, dossier_id: DossierId, observed_version: u64) -> KycRiskResult<bool>;
}

/// Append-only evaluation log.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn append(&self, record: &EvaluationRecord) -> KycRiskResult<()>;

    async fn get(&self, evaluation_id: EvaluationId) -> KycRiskResult<Option<EvaluationRecord>>;

    /// Oldest first.
    async fn history(&self, dossier_id: DossierId) -> KycRiskResult<Vec<EvaluationRecord>>;

    async fn latest(&self, dossier_id: DossierId) -> KycRiskResult<Option<EvaluationRecord>> {
        Ok(self.history(dossier_id).await?.pop())
    }
}

/// Append-only override log.
#[async_trait]
pub trait OverrideStore: Send + Sync {
    async fn append(&self, record: &OverrideRecord) -> KycRiskResult<()>;

    /// Oldest first.
    async fn for_evaluation(&self, evaluation_id: EvaluationId) -> KycRiskResult<Vec<OverrideRecord>>;
}

#[async_trait]
pub trait PepRepository: Send + Sync {
    async fn find(&self, dossier_id: DossierId) -> KycRiskResult<Option<PepInformation>>;

    /// Unconditional upsert, used for seeding and imports.
    async fn save(&self, info: &PepInformation) -> KycRiskResult<()>;

    /// Compare-and-set write. Stores `info` with `version = expected_version + 1`
    /// only if the stored record is still at `expected_version` (a missing
    /// record counts as version 0). Returns `false` on conflict.
    async fn save_if_version(&self, info: &PepInformation, expected_version: u64) -> KycRiskResult<bool>;

    /// PEP_FORMER records whose cessation date is on or before `cutoff`.
    async fn find_former_ceased_on_or_before(
        &self,
        cutoff: NaiveDate,
    ) -> KycRiskResult<Vec<PepInformation>>;

    /// PEP records whose next review date is on or before `date`.
    async fn find_reviews_due(&self, date: NaiveDate) -> KycRiskResult<Vec<PepInformation>>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, document_id: &str) -> KycRiskResult<Option<DueDiligenceDocument>>;

    async fn save(&self, document: &DueDiligenceDocument) -> KycRiskResult<()>;

    async fn list_for_dossier(&self, dossier_id: DossierId) -> KycRiskResult<Vec<DueDiligenceDocument>>;

    /// Documents not yet EXPIRED whose expiry date is on or before `date`.
    async fn find_unexpired_due_by(&self, date: NaiveDate) -> KycRiskResult<Vec<DueDiligenceDocument>>;

    /// Compare-and-set status change. Returns `false` when the stored
    /// status was no longer `expected`.
    async fn transition_status(
        &self,
        document_id: &str,
        expected: DocumentStatus,
        next: DocumentStatus,
    ) -> KycRiskResult<bool>;
}
