mod commands;
mod input;
mod logging;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::evaluate::{EvaluateArgs, StatusArgs};
use commands::overrides::OverrideArgs;
use commands::pep::{PepDowngradesArgs, PepReviewsArgs};
use commands::scheduler::RunSchedulerArgs;
use commands::sweeps::ExpirySweepArgs;
use commands::{CommandResult, Engine, EngineArgs};
use logging::LogFormat;

/// AML/KYC risk evaluation and compliance review engine
#[derive(Parser)]
#[command(
    name = "kyc",
    version,
    about = "AML/KYC risk evaluation and compliance review engine",
    long_about = "Scores customer dossiers against versioned scoring configurations, \
                  records compliance officer overrides, tracks PEP status and \
                  sweeps due-diligence documents for expiry."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    engine: EngineArgs,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log filter when RUST_LOG is unset (e.g. "info", "kyc_risk_core=debug")
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log line format (logs go to stderr)
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a dossier and record the evaluation
    Evaluate(EvaluateArgs),
    /// Override the computed risk level of an evaluation
    Override(OverrideArgs),
    /// Current risk status (or evaluation history) of a dossier
    Status(StatusArgs),
    /// Run the document expiration and upcoming-expiry sweeps
    ExpirySweep(ExpirySweepArgs),
    /// PEPs whose periodic review is due
    PepReviews(PepReviewsArgs),
    /// Former PEPs approaching (or past) the downgrade period
    PepDowngrades(PepDowngradesArgs),
    /// Dossiers under review awaiting a compliance officer PEP decision
    PendingApprovals,
    /// Validate scoring configurations and engine settings
    ConfigCheck,
    /// Run the daily jobs until interrupted
    RunScheduler(RunSchedulerArgs),
    /// Print version information
    Version,
}

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("kyc {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    if let Err(e) = logging::init_logging(&cli.log_level, cli.log_format) {
        eprintln!("{}: {}", "error".red().bold(), e);
        process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: failed to start runtime: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    match runtime.block_on(dispatch(cli.command, &cli.engine)) {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "Command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

async fn dispatch(command: Commands, args: &EngineArgs) -> CommandResult {
    let engine = Engine::load(args)?;
    match command {
        Commands::Evaluate(a) => commands::evaluate::run_evaluate(&engine, a).await,
        Commands::Override(a) => commands::overrides::run_override(&engine, a).await,
        Commands::Status(a) => commands::evaluate::run_status(&engine, a).await,
        Commands::ExpirySweep(a) => commands::sweeps::run_expiry_sweep(&engine, a).await,
        Commands::PepReviews(a) => commands::pep::run_pep_reviews(&engine, a).await,
        Commands::PepDowngrades(a) => commands::pep::run_pep_downgrades(&engine, a).await,
        Commands::PendingApprovals => commands::overrides::run_pending_approvals(&engine).await,
        Commands::ConfigCheck => commands::config::run_config_check(&engine),
        Commands::RunScheduler(a) => commands::scheduler::run_scheduler(&engine, a).await,
        Commands::Version => Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") })),
    }
}
