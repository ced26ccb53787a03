use std::time::Instant;

use clap::Args;
use serde_json::json;
use uuid::Uuid;

use kyc_risk_core::evaluation::EvaluationRequest;
use kyc_risk_core::scoring::CALCULATION_METHOD;
use kyc_risk_core::with_metadata;

use super::{CommandResult, Engine};
use crate::input;

/// Arguments for a risk evaluation
#[derive(Args)]
pub struct EvaluateArgs {
    /// Path to an evaluation request (dossier_id, evaluator_id, payload, comments)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for dossier status queries
#[derive(Args)]
pub struct StatusArgs {
    /// Dossier identifier
    #[arg(long)]
    pub dossier: Uuid,

    /// List every evaluation instead of the current status
    #[arg(long)]
    pub history: bool,
}

pub async fn run_evaluate(engine: &Engine, args: EvaluateArgs) -> CommandResult {
    let request: EvaluationRequest = input::read_input(args.input.as_deref(), "risk evaluation")?;
    let start = Instant::now();
    let record = engine.evaluation_service().evaluate(request).await?;
    let elapsed_us = start.elapsed().as_micros() as u64;
    engine.persist().await?;

    let mut warnings = Vec::new();
    if !record.evidence_complete {
        warnings.push("Dossier holds expired documents; evaluation evidence is incomplete".to_string());
    }
    let assumptions = json!({
        "configuration_version": record.result.configuration_version,
        "as_of": engine.today(),
    });
    let output = with_metadata(
        &format!("Weighted category sum with mitigation ({})", CALCULATION_METHOD),
        &assumptions,
        warnings,
        elapsed_us,
        record,
    );
    Ok(serde_json::to_value(output)?)
}

pub async fn run_status(engine: &Engine, args: StatusArgs) -> CommandResult {
    let service = engine.evaluation_service();
    if args.history {
        return Ok(serde_json::to_value(service.history(args.dossier).await?)?);
    }
    Ok(serde_json::to_value(service.current_status(args.dossier).await?)?)
}
