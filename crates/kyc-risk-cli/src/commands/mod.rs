pub mod config;
pub mod evaluate;
pub mod overrides;
pub mod pep;
pub mod scheduler;
pub mod sweeps;

use std::sync::Arc;

use chrono::NaiveDate;
use clap::Args;
use serde::Deserialize;
use tracing::{debug, info};

use kyc_risk_core::alerts::TracingAlertSink;
use kyc_risk_core::documents::DocumentLifecycleScheduler;
use kyc_risk_core::evaluation::RiskEvaluationService;
use kyc_risk_core::overrides::{OverrideManager, StaticAuthorizer};
use kyc_risk_core::pep::PepStatusTracker;
use kyc_risk_core::scoring::{ConfigurationStore, ScoringConfiguration, StrategyRegistry};
use kyc_risk_core::settings::{DocumentSettings, EngineSettings, PepSettings};
use kyc_risk_core::store::memory::{InMemoryStore, StoreSnapshot};
use kyc_risk_core::{Clock, FixedClock, SystemClock};

use crate::input;

pub type CommandResult = Result<serde_json::Value, Box<dyn std::error::Error>>;

/// Engine inputs shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// Engine settings file (YAML or JSON)
    #[arg(long, global = true)]
    pub settings: Option<String>,

    /// Scoring configuration file(s); each holds one version or a list
    #[arg(long = "config", global = true)]
    pub configs: Vec<String>,

    /// Dossier/PEP/document state snapshot (JSON). Written back after
    /// commands that change state.
    #[arg(long, global = true)]
    pub state: Option<String>,

    /// Evaluate as of this date (YYYY-MM-DD) instead of today
    #[arg(long, global = true)]
    pub as_of: Option<NaiveDate>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigFile {
    Many(Vec<ScoringConfiguration>),
    One(ScoringConfiguration),
}

pub struct Engine {
    settings: Option<EngineSettings>,
    pub store: Arc<InMemoryStore>,
    pub configs: Arc<ConfigurationStore>,
    pub clock: Arc<dyn Clock>,
    state_path: Option<String>,
}

impl Engine {
    pub fn load(args: &EngineArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let settings: Option<EngineSettings> = match &args.settings {
            Some(path) => {
                let settings: EngineSettings = input::file::read_document(path)?;
                settings.validate()?;
                Some(settings)
            }
            None => None,
        };

        let configs = Arc::new(load_configurations(&args.configs)?);
        if let Some(version) = settings
            .as_ref()
            .and_then(|s| s.scoring.active_version.as_deref())
        {
            configs.activate(version)?;
        }

        let store = match &args.state {
            Some(path) if std::path::Path::new(path).exists() => {
                let snapshot: StoreSnapshot = input::file::read_document(path)?;
                InMemoryStore::from_snapshot(snapshot)?
            }
            _ => InMemoryStore::new(),
        };

        let clock: Arc<dyn Clock> = match args.as_of {
            Some(date) => Arc::new(FixedClock::on(date)),
            None => Arc::new(SystemClock),
        };

        debug!(
            versions = ?configs.versions(),
            state = ?args.state,
            as_of = ?args.as_of,
            "Engine loaded"
        );
        Ok(Engine {
            settings,
            store: Arc::new(store),
            configs,
            clock,
            state_path: args.state.clone(),
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn settings(&self) -> Option<&EngineSettings> {
        self.settings.as_ref()
    }

    pub fn pep_settings(&self) -> Result<PepSettings, Box<dyn std::error::Error>> {
        self.settings
            .as_ref()
            .map(|s| s.pep.clone())
            .ok_or_else(|| "--settings with pep.downgrade_period_years is required for PEP commands".into())
    }

    pub fn document_settings(&self) -> DocumentSettings {
        self.settings
            .as_ref()
            .map(|s| s.documents.clone())
            .unwrap_or_default()
    }

    pub fn evaluation_service(&self) -> RiskEvaluationService {
        RiskEvaluationService::new(
            self.configs.clone(),
            Arc::new(StrategyRegistry::with_defaults()),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.clock.clone(),
            self.document_settings(),
        )
    }

    pub fn override_manager(&self, officers: &[String]) -> OverrideManager {
        OverrideManager::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            Arc::new(StaticAuthorizer::new(officers.iter().cloned())),
            self.clock.clone(),
        )
    }

    pub fn pep_tracker(&self) -> Result<PepStatusTracker, Box<dyn std::error::Error>> {
        Ok(PepStatusTracker::new(
            self.store.clone(),
            self.store.clone(),
            self.pep_settings()?,
        ))
    }

    pub fn document_scheduler(&self) -> DocumentLifecycleScheduler {
        DocumentLifecycleScheduler::new(self.store.clone(), self.store.clone(), self.document_settings())
    }

    pub fn alert_sink(&self) -> Arc<TracingAlertSink> {
        Arc::new(TracingAlertSink)
    }

    /// Write the state snapshot back when `--state` was given.
    pub async fn persist(&self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(path) = &self.state_path {
            input::file::write_json(path, &self.store.snapshot().await)?;
            info!(path = %path, "State saved");
        }
        Ok(())
    }
}

fn load_configurations(paths: &[String]) -> Result<ConfigurationStore, Box<dyn std::error::Error>> {
    let store = ConfigurationStore::new();
    for path in paths {
        let configs = match input::file::read_document::<ConfigFile>(path)? {
            ConfigFile::Many(list) => list,
            ConfigFile::One(config) => vec![config],
        };
        for config in configs {
            store.publish(config)?;
        }
    }
    Ok(store)
}
