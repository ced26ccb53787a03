use clap::Args;
use serde_json::json;

use super::{CommandResult, Engine};

/// Arguments for the PEP review query
#[derive(Args)]
pub struct PepReviewsArgs {
    /// Also send a review alert for each result
    #[arg(long)]
    pub notify: bool,
}

/// Arguments for the former-PEP downgrade query
#[derive(Args)]
pub struct PepDowngradesArgs {
    /// Downgrade every eligible former PEP instead of listing candidates
    #[arg(long)]
    pub apply: bool,
}

pub async fn run_pep_reviews(engine: &Engine, args: PepReviewsArgs) -> CommandResult {
    let tracker = engine.pep_tracker()?;
    let today = engine.today();
    if args.notify {
        let report = tracker.run_review_sweep(today, engine.alert_sink().as_ref()).await?;
        return Ok(serde_json::to_value(report)?);
    }
    Ok(serde_json::to_value(tracker.find_pending_reviews(today).await?)?)
}

pub async fn run_pep_downgrades(engine: &Engine, args: PepDowngradesArgs) -> CommandResult {
    let tracker = engine.pep_tracker()?;
    let today = engine.today();
    if args.apply {
        let report = tracker.run_downgrade_sweep(today).await?;
        engine.persist().await?;
        return Ok(serde_json::to_value(report)?);
    }
    let threshold = tracker.downgrade_threshold(today)?;
    let candidates = tracker.find_ex_peps_approaching_downgrade(threshold).await?;
    Ok(json!({
        "as_of": today,
        "threshold_date": threshold,
        "downgrade_period_years": tracker.settings().downgrade_period_years,
        "result": candidates,
    }))
}
