pub mod tracker;

pub use tracker::{DowngradeCandidate, DowngradeSweepReport, PepStatusTracker, ReviewDue, ReviewSweepReport};

use chrono::{Months, NaiveDate};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::KycRiskError;
use crate::types::{DossierId, Principal, Score};
use crate::KycRiskResult;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PepType {
    PepDomestic,
    PepForeign,
    PepInternationalOrg,
    PepFamily,
    PepAssociate,
    PepFormer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionOutcome {
    Approved,
    Rejected,
    Escalated,
}

/// Lifecycle state derived from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PepStatus {
    NotPep,
    PepActive { pep_type: PepType },
    PepFormer { cessation_date: NaiveDate },
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PepDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organisation: Option<String>,
    /// For family members and associates: the PEP they are linked to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_pep: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cessation_date: Option<NaiveDate>,
    /// Classification held before the role ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_type: Option<PepType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceOfficerDecision {
    pub outcome: DecisionOutcome,
    pub decided_by: Principal,
    pub decided_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PepTransition {
    pub from: PepStatus,
    pub to: PepStatus,
    pub on: NaiveDate,
    pub reason: String,
}

/// PEP classification of one dossier. Never deleted; a subject leaves PEP
/// status only through a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PepInformation {
    pub dossier_id: DossierId,
    pub is_pep: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pep_type: Option<PepType>,
    #[serde(default)]
    pub details: PepDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review_date: Option<NaiveDate>,
    /// `None` while the decision is pending.
    #[serde(default)]
    pub compliance_officer_decision: Option<ComplianceOfficerDecision>,
    #[serde(default)]
    pub transitions: Vec<PepTransition>,
    /// Optimistic-concurrency counter, bumped by every conditional save.
    #[serde(default)]
    pub version: u64,
}

/// PEP input for the `pep` scoring category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PepRiskFactor {
    pub is_pep: bool,
    #[serde(default)]
    pub pep_type: Option<PepType>,
}

impl PepRiskFactor {
    pub fn not_pep() -> Self {
        PepRiskFactor {
            is_pep: false,
            pep_type: None,
        }
    }

    /// Raw score on the 0-100 scale. Former PEPs keep a reduced score until
    /// they are downgraded.
    pub fn raw_score(&self) -> Score {
        if !self.is_pep {
            return dec!(0);
        }
        match self.pep_type {
            Some(PepType::PepForeign) | None => dec!(100),
            Some(PepType::PepInternationalOrg) => dec!(90),
            Some(PepType::PepDomestic) => dec!(80),
            Some(PepType::PepFamily) => dec!(70),
            Some(PepType::PepAssociate) => dec!(60),
            Some(PepType::PepFormer) => dec!(40),
        }
    }
}

fn add_months(date: NaiveDate, months: u32) -> KycRiskResult<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| KycRiskError::validation("date", format!("{date} + {months} months overflows")))
}

/// Cooling-off period in months, `None` if it does not fit a `u32`.
pub fn downgrade_period_months(downgrade_period_years: u32) -> Option<u32> {
    downgrade_period_years.checked_mul(12)
}

impl PepInformation {
    pub fn not_pep(dossier_id: DossierId) -> Self {
        PepInformation {
            dossier_id,
            is_pep: false,
            pep_type: None,
            details: PepDetails::default(),
            next_review_date: None,
            compliance_officer_decision: None,
            transitions: Vec::new(),
            version: 0,
        }
    }

    pub fn status(&self) -> PepStatus {
        match (self.is_pep, self.pep_type, self.details.cessation_date) {
            (true, Some(PepType::PepFormer), Some(cessation_date)) => {
                PepStatus::PepFormer { cessation_date }
            }
            (true, Some(pep_type), _) => PepStatus::PepActive { pep_type },
            _ => PepStatus::NotPep,
        }
    }

    pub fn risk_factor(&self) -> PepRiskFactor {
        PepRiskFactor {
            is_pep: self.is_pep,
            pep_type: self.pep_type,
        }
    }

    pub fn validate(&self) -> KycRiskResult<()> {
        if self.is_pep {
            if self.pep_type.is_none() {
                return Err(KycRiskError::validation("pep_type", "required while is_pep is true"));
            }
            if self.next_review_date.is_none() {
                return Err(KycRiskError::validation(
                    "next_review_date",
                    "required while is_pep is true",
                ));
            }
        } else if self.pep_type.is_some() {
            return Err(KycRiskError::validation("pep_type", "must be empty for a non-PEP"));
        }
        let former = self.pep_type == Some(PepType::PepFormer);
        if former != self.details.cessation_date.is_some() {
            return Err(KycRiskError::validation(
                "cessation_date",
                "present if and only if pep_type is PEP_FORMER",
            ));
        }
        Ok(())
    }

    fn transition(&mut self, from: PepStatus, on: NaiveDate, reason: impl Into<String>) {
        let to = self.status();
        self.transitions.push(PepTransition {
            from,
            to,
            on,
            reason: reason.into(),
        });
    }

    /// NOT_PEP or PEP_FORMER to PEP_ACTIVE, or a change of active type.
    /// The compliance-officer decision resets to pending.
    pub fn classify(
        &mut self,
        pep_type: PepType,
        details: PepDetails,
        today: NaiveDate,
        review_interval_months: u32,
    ) -> KycRiskResult<()> {
        if pep_type == PepType::PepFormer {
            return Err(KycRiskError::validation(
                "pep_type",
                "PEP_FORMER is reached by recording a cessation date",
            ));
        }
        let from = self.status();
        self.is_pep = true;
        self.pep_type = Some(pep_type);
        self.details = PepDetails {
            cessation_date: None,
            previous_type: None,
            ..details
        };
        self.next_review_date = Some(add_months(today, review_interval_months)?);
        self.compliance_officer_decision = None;
        self.transition(from, today, "classified");
        Ok(())
    }

    /// PEP_ACTIVE to PEP_FORMER.
    pub fn record_cessation(&mut self, cessation_date: NaiveDate, today: NaiveDate) -> KycRiskResult<()> {
        let from = self.status();
        let PepStatus::PepActive { pep_type } = from else {
            return Err(KycRiskError::validation(
                "pep_status",
                "cessation can only be recorded for an active PEP",
            ));
        };
        if cessation_date > today {
            return Err(KycRiskError::validation(
                "cessation_date",
                "must not be in the future",
            ));
        }
        self.pep_type = Some(PepType::PepFormer);
        self.details.previous_type = Some(pep_type);
        self.details.cessation_date = Some(cessation_date);
        self.transition(from, today, "role ended");
        Ok(())
    }

    /// PEP_ACTIVE to NOT_PEP (e.g. a screening false positive).
    pub fn declassify(&mut self, today: NaiveDate, reason: &str) -> KycRiskResult<()> {
        let from = self.status();
        if !matches!(from, PepStatus::PepActive { .. }) {
            return Err(KycRiskError::validation(
                "pep_status",
                "only an active PEP can be declassified; former PEPs wait for downgrade",
            ));
        }
        self.clear_pep();
        self.transition(from, today, reason);
        Ok(())
    }

    /// Date on which the cooling-off period ends.
    pub fn downgrade_date(&self, downgrade_period_years: u32) -> Option<NaiveDate> {
        match self.status() {
            PepStatus::PepFormer { cessation_date } => {
                add_months(cessation_date, downgrade_period_months(downgrade_period_years)?).ok()
            }
            _ => None,
        }
    }

    /// True once `today` is strictly past the end of the cooling-off period.
    pub fn is_downgrade_eligible(&self, today: NaiveDate, downgrade_period_years: u32) -> bool {
        self.downgrade_date(downgrade_period_years)
            .is_some_and(|d| today > d)
    }

    /// PEP_FORMER to NOT_PEP.
    pub fn downgrade(&mut self, today: NaiveDate, downgrade_period_years: u32) -> KycRiskResult<()> {
        let from = self.status();
        if !self.is_downgrade_eligible(today, downgrade_period_years) {
            return Err(KycRiskError::validation(
                "pep_status",
                "downgrade period has not elapsed for this record",
            ));
        }
        self.clear_pep();
        self.transition(from, today, "downgrade period elapsed");
        Ok(())
    }

    pub fn complete_review(
        &mut self,
        outcome: DecisionOutcome,
        decided_by: Principal,
        today: NaiveDate,
        review_interval_months: u32,
    ) -> KycRiskResult<()> {
        if !self.is_pep {
            return Err(KycRiskError::validation(
                "pep_status",
                "reviews apply to PEP records only",
            ));
        }
        self.compliance_officer_decision = Some(ComplianceOfficerDecision {
            outcome,
            decided_by,
            decided_on: today,
        });
        self.next_review_date = Some(add_months(today, review_interval_months)?);
        Ok(())
    }

    fn clear_pep(&mut self) {
        self.is_pep = false;
        self.pep_type = None;
        self.details.cessation_date = None;
        self.next_review_date = None;
    }
}
