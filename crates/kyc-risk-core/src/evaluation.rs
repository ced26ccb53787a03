//! Evaluation service: resolves the configuration, scores, aggregates and
//! appends one immutable [`EvaluationRecord`] per run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::documents::DocumentEvidence;
use crate::error::KycRiskError;
use crate::overrides::OverrideRecord;
use crate::scoring::{
    calculate_risk, CategoryKey, ConfigurationStore, RiskCalculationResult, RiskFactorInput,
    RiskFactorPayload, StrategyRegistry,
};
use crate::settings::DocumentSettings;
use crate::store::{DocumentStore, DossierStore, EvaluationStore, OverrideStore, PepRepository};
use crate::types::{Clock, DossierId, EvaluationId, Principal, RiskLevel, Score};
use crate::KycRiskResult;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub dossier_id: DossierId,
    pub evaluator_id: Principal,
    #[serde(default)]
    pub payload: RiskFactorPayload,
    #[serde(default)]
    pub comments: Option<String>,
    /// Pin a configuration version instead of the active one.
    #[serde(default)]
    pub configuration_version: Option<String>,
}

/// One stored evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub evaluation_id: EvaluationId,
    pub dossier_id: DossierId,
    pub evaluator_id: Principal,
    pub comments: Option<String>,
    pub evaluated_at: DateTime<Utc>,
    /// False when any supporting document had lapsed at evaluation time.
    pub evidence_complete: bool,
    pub result: RiskCalculationResult,
}

/// Computed and overridden level side by side for the latest evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DossierRiskStatus {
    pub dossier_id: DossierId,
    pub evaluation_id: EvaluationId,
    pub evaluated_at: DateTime<Utc>,
    pub computed_level: RiskLevel,
    pub adjusted_score: Score,
    pub configuration_version: String,
    pub latest_override: Option<OverrideRecord>,
    pub effective_level: RiskLevel,
    pub evidence_complete: bool,
    pub requires_reevaluation: bool,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct RiskEvaluationService {
    configs: Arc<ConfigurationStore>,
    registry: Arc<StrategyRegistry>,
    evaluations: Arc<dyn EvaluationStore>,
    overrides: Arc<dyn OverrideStore>,
    dossiers: Arc<dyn DossierStore>,
    documents: Arc<dyn DocumentStore>,
    peps: Arc<dyn PepRepository>,
    clock: Arc<dyn Clock>,
    document_settings: DocumentSettings,
}

impl RiskEvaluationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        configs: Arc<ConfigurationStore>,
        registry: Arc<StrategyRegistry>,
        evaluations: Arc<dyn EvaluationStore>,
        overrides: Arc<dyn OverrideStore>,
        dossiers: Arc<dyn DossierStore>,
        documents: Arc<dyn DocumentStore>,
        peps: Arc<dyn PepRepository>,
        clock: Arc<dyn Clock>,
        document_settings: DocumentSettings,
    ) -> Self {
        Self {
            configs,
            registry,
            evaluations,
            overrides,
            dossiers,
            documents,
            peps,
            clock,
            document_settings,
        }
    }

    /// Run one evaluation. Nothing is written unless the whole result was
    /// computed; the record is persisted with a single append.
    #[instrument(skip(self, request), fields(dossier_id = %request.dossier_id, evaluator = %request.evaluator_id))]
    pub async fn evaluate(&self, request: EvaluationRequest) -> KycRiskResult<EvaluationRecord> {
        let dossier_id = request.dossier_id;
        let dossier = self
            .dossiers
            .get(dossier_id)
            .await?
            .ok_or_else(|| KycRiskError::not_found("dossier", dossier_id))?;

        let config = self
            .configs
            .resolve(request.configuration_version.as_deref())
            .inspect_err(|e| error!(%dossier_id, error = %e, "Configuration resolution failed"))?;

        let now = self.clock.now();
        let today = now.date_naive();
        let documents = self.documents.list_for_dossier(dossier_id).await?;
        let evidence =
            DocumentEvidence::from_documents(&documents, today, self.document_settings.expiring_window_days);
        let payload = self.with_tracked_factors(dossier_id, request.payload, &evidence).await?;

        let result = calculate_risk(&config, &payload, &self.registry).inspect_err(|e| {
            error!(%dossier_id, configuration_version = %config.version, error = %e, "Risk calculation failed")
        })?;

        let record = EvaluationRecord {
            evaluation_id: Uuid::new_v4(),
            dossier_id,
            evaluator_id: request.evaluator_id,
            comments: request.comments.filter(|c| !c.trim().is_empty()),
            evaluated_at: now,
            evidence_complete: evidence.is_complete(),
            result,
        };

        self.evaluations.append(&record).await.inspect_err(|e| {
            error!(%dossier_id, evaluation_id = %record.evaluation_id, error = %e, "Failed to store evaluation")
        })?;
        // The dossier was read before any PEP or document state, so a flag
        // raised since then means this result may be stale and must stay
        // flagged.
        if dossier.requires_reevaluation {
            let cleared = self
                .dossiers
                .clear_reevaluation(dossier_id, dossier.flag_version)
                .await?;
            if !cleared {
                warn!(%dossier_id, evaluation_id = %record.evaluation_id, "Dossier re-flagged during evaluation, keeping re-evaluation flag");
            }
        }

        info!(
            %dossier_id,
            evaluation_id = %record.evaluation_id,
            configuration_version = %record.result.configuration_version,
            adjusted_score = %record.result.adjusted_score,
            risk_level = %record.result.risk_level,
            evidence_complete = record.evidence_complete,
            "Risk evaluation recorded"
        );
        Ok(record)
    }

    /// Fill the `pep` and `documents` categories from tracked state when the
    /// caller did not supply them. Caller-supplied inputs always win.
    async fn with_tracked_factors(
        &self,
        dossier_id: DossierId,
        mut payload: RiskFactorPayload,
        evidence: &DocumentEvidence,
    ) -> KycRiskResult<RiskFactorPayload> {
        let pep_key = CategoryKey::from(CategoryKey::PEP);
        if !payload.factors.contains_key(&pep_key) {
            if let Some(info) = self.peps.find(dossier_id).await? {
                payload.factors.insert(pep_key, RiskFactorInput::Pep(info.risk_factor()));
            }
        }
        let documents_key = CategoryKey::from(CategoryKey::DOCUMENTS);
        if evidence.total > 0 && !payload.factors.contains_key(&documents_key) {
            payload
                .factors
                .insert(documents_key, RiskFactorInput::Documents(evidence.clone()));
        }
        Ok(payload)
    }

    pub async fn get(&self, evaluation_id: EvaluationId) -> KycRiskResult<EvaluationRecord> {
        self.evaluations
            .get(evaluation_id)
            .await?
            .ok_or_else(|| KycRiskError::not_found("evaluation", evaluation_id))
    }

    pub async fn latest(&self, dossier_id: DossierId) -> KycRiskResult<Option<EvaluationRecord>> {
        self.evaluations.latest(dossier_id).await
    }

    /// Oldest first.
    pub async fn history(&self, dossier_id: DossierId) -> KycRiskResult<Vec<EvaluationRecord>> {
        self.evaluations.history(dossier_id).await
    }

    /// "Current" status is the most recent evaluation, with its most recent
    /// override layered on top.
    pub async fn current_status(&self, dossier_id: DossierId) -> KycRiskResult<DossierRiskStatus> {
        let dossier = self
            .dossiers
            .get(dossier_id)
            .await?
            .ok_or_else(|| KycRiskError::not_found("dossier", dossier_id))?;
        let latest = self
            .evaluations
            .latest(dossier_id)
            .await?
            .ok_or_else(|| KycRiskError::not_found("evaluation for dossier", dossier_id))?;
        let latest_override = self.overrides.for_evaluation(latest.evaluation_id).await?.pop();
        let computed_level = latest.result.risk_level;

        Ok(DossierRiskStatus {
            dossier_id,
            evaluation_id: latest.evaluation_id,
            evaluated_at: latest.evaluated_at,
            computed_level,
            adjusted_score: latest.result.adjusted_score,
            configuration_version: latest.result.configuration_version,
            effective_level: latest_override
                .as_ref()
                .map(|o| o.final_risk_level)
                .unwrap_or(computed_level),
            latest_override,
            evidence_complete: latest.evidence_complete,
            requires_reevaluation: dossier.requires_reevaluation,
        })
    }
}
