use std::sync::Arc;

use clap::Args;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use kyc_risk_core::scheduler::JobScheduler;

use super::{CommandResult, Engine};

/// Arguments for the long-running job scheduler
#[derive(Args)]
pub struct RunSchedulerArgs {
    /// Run every job once immediately and exit
    #[arg(long)]
    pub once: bool,
}

pub async fn run_scheduler(engine: &Engine, args: RunSchedulerArgs) -> CommandResult {
    let settings = engine
        .settings()
        .cloned()
        .ok_or("--settings is required for run-scheduler")?;
    let scheduler = JobScheduler::new(
        &settings.schedule,
        Arc::new(engine.document_scheduler()),
        Arc::new(engine.pep_tracker()?),
        engine.alert_sink(),
        engine.clock.clone(),
    );

    if args.once {
        let mut results = Vec::new();
        for (job, outcome) in scheduler.run_all_now().await {
            results.push(match outcome {
                Ok(report) => json!({ "job": job, "ok": true, "report": report }),
                Err(e) => json!({ "job": job, "ok": false, "error": e.to_string() }),
            });
        }
        engine.persist().await?;
        return Ok(json!({ "result": results }));
    }

    let token = CancellationToken::new();
    let (completed_tx, mut completed) = mpsc::unbounded_channel();
    let handles = scheduler.spawn_all_reporting(&token, &completed_tx);
    drop(completed_tx);
    info!(jobs = handles.len(), "Scheduler running, press Ctrl-C to stop");

    // Save after every completed run so a killed process loses at most the
    // run in flight.
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal?;
                break;
            }
            Some((job, _report)) = completed.recv() => {
                if let Err(e) = engine.persist().await {
                    error!(job, error = %e, "Failed to save state after job run");
                }
            }
        }
    }
    info!("Shutdown requested");
    token.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Job task ended abnormally");
        }
    }
    engine.persist().await?;

    Ok(json!({ "stopped": true }))
}
