//! Human overrides layered on computed evaluations, and the
//! pending-compliance-approval query.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::dossier::DossierStatus;
use crate::error::KycRiskError;
use crate::pep::PepType;
use crate::store::{DossierStore, EvaluationStore, OverrideStore, PepRepository};
use crate::types::{Clock, DossierId, EvaluationId, OverrideId, Principal, RiskLevel};
use crate::KycRiskResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub evaluation_id: EvaluationId,
    pub final_risk_level: RiskLevel,
    pub justification: String,
    pub acting_principal: Principal,
}

/// Additive record; the evaluation it refers to is never touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub override_id: OverrideId,
    pub evaluation_id: EvaluationId,
    pub dossier_id: DossierId,
    pub computed_level: RiskLevel,
    pub final_risk_level: RiskLevel,
    pub justification: String,
    pub overridden_by: Principal,
    pub overridden_at: DateTime<Utc>,
}

/// Dossier waiting on a compliance officer's PEP decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub dossier_id: DossierId,
    pub name: String,
    pub pep_type: Option<PepType>,
    pub next_review_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Authorization collaborator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ComplianceAuthorizer: Send + Sync {
    async fn has_compliance_officer_capability(&self, principal: &Principal) -> KycRiskResult<bool>;
}

/// Fixed allow-list of compliance officers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticAuthorizer {
    pub compliance_officers: BTreeSet<String>,
}

impl StaticAuthorizer {
    pub fn new<I, S>(officers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StaticAuthorizer {
            compliance_officers: officers.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ComplianceAuthorizer for StaticAuthorizer {
    async fn has_compliance_officer_capability(&self, principal: &Principal) -> KycRiskResult<bool> {
        Ok(self.compliance_officers.contains(principal.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

pub struct OverrideManager {
    evaluations: Arc<dyn EvaluationStore>,
    overrides: Arc<dyn OverrideStore>,
    dossiers: Arc<dyn DossierStore>,
    peps: Arc<dyn PepRepository>,
    authorizer: Arc<dyn ComplianceAuthorizer>,
    clock: Arc<dyn Clock>,
}

impl OverrideManager {
    pub fn new(
        evaluations: Arc<dyn EvaluationStore>,
        overrides: Arc<dyn OverrideStore>,
        dossiers: Arc<dyn DossierStore>,
        peps: Arc<dyn PepRepository>,
        authorizer: Arc<dyn ComplianceAuthorizer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            evaluations,
            overrides,
            dossiers,
            peps,
            authorizer,
            clock,
        }
    }

    /// Checks run cheapest first: justification, capability, then the
    /// referenced evaluation. Any failure leaves the store untouched.
    #[instrument(skip(self, request), fields(evaluation_id = %request.evaluation_id, principal = %request.acting_principal))]
    pub async fn submit(&self, request: OverrideRequest) -> KycRiskResult<OverrideRecord> {
        let justification = request.justification.trim();
        if justification.is_empty() {
            warn!(evaluation_id = %request.evaluation_id, "Override rejected: empty justification");
            return Err(KycRiskError::validation("justification", "must not be empty"));
        }

        if !self
            .authorizer
            .has_compliance_officer_capability(&request.acting_principal)
            .await?
        {
            warn!(
                evaluation_id = %request.evaluation_id,
                principal = %request.acting_principal,
                "Override rejected: missing compliance officer capability"
            );
            return Err(KycRiskError::Authorization {
                principal: request.acting_principal.to_string(),
                reason: "compliance officer capability required".into(),
            });
        }

        let evaluation = self
            .evaluations
            .get(request.evaluation_id)
            .await?
            .ok_or_else(|| KycRiskError::not_found("evaluation", request.evaluation_id))?;

        let record = OverrideRecord {
            override_id: Uuid::new_v4(),
            evaluation_id: evaluation.evaluation_id,
            dossier_id: evaluation.dossier_id,
            computed_level: evaluation.result.risk_level,
            final_risk_level: request.final_risk_level,
            justification: justification.to_string(),
            overridden_by: request.acting_principal,
            overridden_at: self.clock.now(),
        };
        self.overrides.append(&record).await?;

        info!(
            dossier_id = %record.dossier_id,
            evaluation_id = %record.evaluation_id,
            override_id = %record.override_id,
            computed = %record.computed_level,
            overridden = %record.final_risk_level,
            by = %record.overridden_by,
            "Risk level overridden"
        );
        Ok(record)
    }

    /// Oldest first.
    pub async fn overrides_for(&self, evaluation_id: EvaluationId) -> KycRiskResult<Vec<OverrideRecord>> {
        self.overrides.for_evaluation(evaluation_id).await
    }

    /// Dossiers UNDER_REVIEW whose PEP record has no compliance officer
    /// decision yet, soonest review first.
    pub async fn pending_approvals(&self) -> KycRiskResult<Vec<PendingApproval>> {
        let mut pending = Vec::new();
        for dossier in self.dossiers.list_by_status(DossierStatus::UnderReview).await? {
            let Some(pep) = self.peps.find(dossier.dossier_id).await? else {
                continue;
            };
            if pep.is_pep && pep.compliance_officer_decision.is_none() {
                pending.push(PendingApproval {
                    dossier_id: dossier.dossier_id,
                    name: dossier.name,
                    pep_type: pep.pep_type,
                    next_review_date: pep.next_review_date,
                });
            }
        }
        // is_pep implies a review date; None sorts last
        pending.sort_by(|a, b| {
            a.next_review_date
                .is_none()
                .cmp(&b.next_review_date.is_none())
                .then(a.next_review_date.cmp(&b.next_review_date))
                .then(a.dossier_id.cmp(&b.dossier_id))
        });
        Ok(pending)
    }
}
