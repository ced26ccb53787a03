use chrono::NaiveDate;
use napi::Result as NapiResult;
use napi_derive::napi;
use serde::{Deserialize, Serialize};

use kyc_risk_core::documents::{DocumentStatus, DueDiligenceDocument};
use kyc_risk_core::scoring::{calculate_risk, RiskFactorPayload, ScoringConfiguration, StrategyRegistry};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct EvaluateRiskInput {
    configuration: ScoringConfiguration,
    #[serde(default)]
    payload: RiskFactorPayload,
}

/// Pure scoring run: configuration + payload in, RiskCalculationResult out.
/// Nothing is stored.
#[napi]
pub fn evaluate_risk(input_json: String) -> NapiResult<String> {
    let input: EvaluateRiskInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    input.configuration.validate().map_err(to_napi_error)?;
    let result = calculate_risk(
        &input.configuration,
        &input.payload,
        &StrategyRegistry::with_defaults(),
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&result).map_err(to_napi_error)
}

#[derive(Serialize)]
struct ConfigurationSummary {
    valid: bool,
    version: String,
    active_categories: usize,
}

#[napi]
pub fn validate_configuration(config_json: String) -> NapiResult<String> {
    let config: ScoringConfiguration = serde_json::from_str(&config_json).map_err(to_napi_error)?;
    config.validate().map_err(to_napi_error)?;
    let summary = ConfigurationSummary {
        valid: true,
        active_categories: config.active_categories().count(),
        version: config.version,
    };
    serde_json::to_string(&summary).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct DocumentStatusInput {
    document: DueDiligenceDocument,
    as_of: NaiveDate,
    #[serde(default = "default_expiring_window_days")]
    expiring_window_days: u32,
}

fn default_expiring_window_days() -> u32 {
    30
}

#[derive(Serialize)]
struct DocumentStatusOutput {
    document_id: String,
    status: DocumentStatus,
    days_remaining: Option<i64>,
}

/// Status of one document as of a date, recomputed from its expiry date.
#[napi]
pub fn document_status(input_json: String) -> NapiResult<String> {
    let input: DocumentStatusInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    input.document.validate().map_err(to_napi_error)?;
    let output = DocumentStatusOutput {
        status: input.document.status_on(input.as_of, input.expiring_window_days),
        days_remaining: input.document.days_remaining(input.as_of),
        document_id: input.document.document_id,
    };
    serde_json::to_string(&output).map_err(to_napi_error)
}
