use clap::{Args, ValueEnum};
use serde_json::json;

use kyc_risk_core::alerts::AlertSink;

use super::{CommandResult, Engine};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SweepKind {
    /// Mark lapsed documents EXPIRED
    Expiration,
    /// Alert on documents expiring within the warning windows
    Upcoming,
    /// Both, expiration first
    All,
}

/// Arguments for the document expiry sweeps
#[derive(Args)]
pub struct ExpirySweepArgs {
    #[arg(long, value_enum, default_value = "all")]
    pub kind: SweepKind,
}

pub async fn run_expiry_sweep(engine: &Engine, args: ExpirySweepArgs) -> CommandResult {
    let scheduler = engine.document_scheduler();
    let alerts = engine.alert_sink();
    let today = engine.today();

    let mut output = serde_json::Map::new();
    if matches!(args.kind, SweepKind::Expiration | SweepKind::All) {
        let report = scheduler.run_expiration_sweep(today).await?;
        for alert in report.alerts(today) {
            alerts.document_alert(&alert).await?;
        }
        output.insert("expiration".into(), serde_json::to_value(&report)?);
    }
    if matches!(args.kind, SweepKind::Upcoming | SweepKind::All) {
        let report = scheduler.run_upcoming_expiry_sweep(today, alerts.as_ref()).await?;
        output.insert("upcoming".into(), serde_json::to_value(&report)?);
    }
    engine.persist().await?;

    Ok(json!({ "as_of": today, "result": output }))
}
