use serde::{Deserialize, Serialize};

use crate::types::DossierId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DossierStatus {
    Draft,
    UnderReview,
    Approved,
    Rejected,
    Closed,
}

/// The customer or entity record under due diligence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dossier {
    pub dossier_id: DossierId,
    pub name: String,
    pub status: DossierStatus,
    /// Set when PEP or document status changed after the last evaluation.
    #[serde(default)]
    pub requires_reevaluation: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reevaluation_reasons: Vec<String>,
    /// Bumped on every flag so a clear can tell whether a newer flag landed
    /// after it read the dossier.
    #[serde(default)]
    pub flag_version: u64,
}

impl Dossier {
    pub fn new(dossier_id: DossierId, name: impl Into<String>, status: DossierStatus) -> Self {
        Dossier {
            dossier_id,
            name: name.into(),
            status,
            requires_reevaluation: false,
            reevaluation_reasons: Vec::new(),
            flag_version: 0,
        }
    }
}
