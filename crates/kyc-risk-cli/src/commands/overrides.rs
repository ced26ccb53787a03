use clap::Args;

use kyc_risk_core::overrides::OverrideRequest;

use super::{CommandResult, Engine};
use crate::input;

/// Arguments for recording a risk level override
#[derive(Args)]
pub struct OverrideArgs {
    /// Path to an override request (evaluation_id, final_risk_level, justification, acting_principal)
    #[arg(long)]
    pub input: Option<String>,

    /// Principal holding the compliance officer capability (repeatable)
    #[arg(long = "officer")]
    pub officers: Vec<String>,
}

pub async fn run_override(engine: &Engine, args: OverrideArgs) -> CommandResult {
    let request: OverrideRequest = input::read_input(args.input.as_deref(), "override")?;
    let record = engine.override_manager(&args.officers).submit(request).await?;
    engine.persist().await?;
    Ok(serde_json::to_value(record)?)
}

pub async fn run_pending_approvals(engine: &Engine) -> CommandResult {
    let pending = engine.override_manager(&[]).pending_approvals().await?;
    Ok(serde_json::to_value(pending)?)
}
