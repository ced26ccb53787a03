use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::KycRiskError;
use crate::KycRiskResult;

const SETTINGS: &str = "engine-settings";

/// Longest cooling-off period accepted for a former PEP.
pub const MAX_DOWNGRADE_PERIOD_YEARS: u32 = 100;

/// Runtime settings for the time-driven subsystems.
///
/// `pep.downgrade_period_years` has no default: the regulatory cooling-off
/// period must be stated explicitly by the deploying institution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub pep: PepSettings,
    #[serde(default)]
    pub documents: DocumentSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PepSettings {
    pub downgrade_period_years: u32,
    #[serde(default = "default_review_interval_months")]
    pub review_interval_months: u32,
    /// Look-ahead used when asking which former PEPs approach downgrade.
    #[serde(default = "default_downgrade_notice_days")]
    pub downgrade_notice_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSettings {
    #[serde(default = "default_expiring_window_days")]
    pub expiring_window_days: u32,
    #[serde(default = "default_urgent_window_days")]
    pub urgent_window_days: u32,
}

/// Daily trigger times, UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    #[serde(default = "default_expiration_sweep_at")]
    pub expiration_sweep_at: NaiveTime,
    #[serde(default = "default_upcoming_expiry_sweep_at")]
    pub upcoming_expiry_sweep_at: NaiveTime,
    #[serde(default = "default_pep_review_at")]
    pub pep_review_at: NaiveTime,
    #[serde(default = "default_pep_downgrade_at")]
    pub pep_downgrade_at: NaiveTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_version: Option<String>,
}

fn default_review_interval_months() -> u32 {
    12
}

fn default_downgrade_notice_days() -> u32 {
    90
}

fn default_expiring_window_days() -> u32 {
    30
}

fn default_urgent_window_days() -> u32 {
    7
}

fn hms(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

fn default_expiration_sweep_at() -> NaiveTime {
    hms(1, 0)
}

fn default_upcoming_expiry_sweep_at() -> NaiveTime {
    hms(6, 0)
}

fn default_pep_review_at() -> NaiveTime {
    hms(7, 0)
}

fn default_pep_downgrade_at() -> NaiveTime {
    hms(2, 0)
}

impl Default for DocumentSettings {
    fn default() -> Self {
        DocumentSettings {
            expiring_window_days: default_expiring_window_days(),
            urgent_window_days: default_urgent_window_days(),
        }
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        ScheduleSettings {
            expiration_sweep_at: default_expiration_sweep_at(),
            upcoming_expiry_sweep_at: default_upcoming_expiry_sweep_at(),
            pep_review_at: default_pep_review_at(),
            pep_downgrade_at: default_pep_downgrade_at(),
        }
    }
}

impl PepSettings {
    pub fn new(downgrade_period_years: u32) -> Self {
        PepSettings {
            downgrade_period_years,
            review_interval_months: default_review_interval_months(),
            downgrade_notice_days: default_downgrade_notice_days(),
        }
    }
}

impl EngineSettings {
    pub fn new(pep: PepSettings) -> Self {
        EngineSettings {
            pep,
            documents: DocumentSettings::default(),
            schedule: ScheduleSettings::default(),
            scoring: ScoringSettings::default(),
        }
    }

    pub fn validate(&self) -> KycRiskResult<()> {
        if self.pep.downgrade_period_years == 0 {
            return Err(KycRiskError::configuration(
                SETTINGS,
                "pep.downgrade_period_years must be at least 1",
            ));
        }
        if self.pep.downgrade_period_years > MAX_DOWNGRADE_PERIOD_YEARS {
            return Err(KycRiskError::configuration(
                SETTINGS,
                format!(
                    "pep.downgrade_period_years must not exceed {MAX_DOWNGRADE_PERIOD_YEARS}, got {}",
                    self.pep.downgrade_period_years
                ),
            ));
        }
        if self.pep.review_interval_months == 0 {
            return Err(KycRiskError::configuration(
                SETTINGS,
                "pep.review_interval_months must be at least 1",
            ));
        }
        let docs = &self.documents;
        if docs.urgent_window_days == 0 || docs.urgent_window_days > docs.expiring_window_days {
            return Err(KycRiskError::configuration(
                SETTINGS,
                format!(
                    "documents windows must satisfy 0 < urgent ({}) <= expiring ({})",
                    docs.urgent_window_days, docs.expiring_window_days
                ),
            ));
        }
        if let Some(version) = &self.scoring.active_version {
            if version.trim().is_empty() {
                return Err(KycRiskError::configuration(
                    SETTINGS,
                    "scoring.active_version must not be blank",
                ));
            }
        }
        Ok(())
    }
}
