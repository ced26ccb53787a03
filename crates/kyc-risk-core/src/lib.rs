pub mod alerts;
pub mod documents;
pub mod dossier;
pub mod error;
pub mod evaluation;
pub mod overrides;
pub mod pep;
pub mod scoring;
pub mod settings;
pub mod store;
pub mod types;

#[cfg(feature = "scheduler")]
pub mod scheduler;

pub use error::KycRiskError;
pub use types::*;

pub use documents::{DocumentLifecycleScheduler, DueDiligenceDocument};
pub use evaluation::{EvaluationRecord, EvaluationRequest, RiskEvaluationService};
pub use overrides::{OverrideManager, OverrideRecord, OverrideRequest};
pub use pep::{PepInformation, PepStatusTracker};
pub use scoring::{calculate_risk, ConfigurationStore, RiskCalculationResult, ScoringConfiguration};
pub use settings::EngineSettings;

/// Standard result type for all kyc-risk operations
pub type KycRiskResult<T> = Result<T, KycRiskError>;
