use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::Score;

/// FATF "call for action" jurisdictions.
const FATF_BLACK_LIST: &[&str] = &["north korea", "dprk", "iran", "myanmar"];

/// FATF increased-monitoring jurisdictions.
const FATF_GREY_LIST: &[&str] = &[
    "albania",
    "barbados",
    "burkina faso",
    "cameroon",
    "cayman islands",
    "croatia",
    "democratic republic of the congo",
    "gibraltar",
    "haiti",
    "jamaica",
    "jordan",
    "mali",
    "mozambique",
    "nigeria",
    "panama",
    "philippines",
    "senegal",
    "south africa",
    "south sudan",
    "syria",
    "tanzania",
    "turkey",
    "uganda",
    "united arab emirates",
    "vietnam",
    "yemen",
];

/// Comprehensive embargoes.
const SANCTIONED: &[&str] = &["north korea", "dprk", "iran", "cuba", "syria", "crimea"];

/// EU high-risk third countries (representative subset).
const EU_HIGH_RISK: &[&str] = &[
    "afghanistan",
    "barbados",
    "burkina faso",
    "cambodia",
    "cayman islands",
    "democratic republic of the congo",
    "gibraltar",
    "haiti",
    "jamaica",
    "jordan",
    "mali",
    "morocco",
    "mozambique",
    "myanmar",
    "nicaragua",
    "nigeria",
    "pakistan",
    "panama",
    "philippines",
    "senegal",
    "south sudan",
    "syria",
    "tanzania",
    "trinidad and tobago",
    "turkey",
    "uganda",
    "united arab emirates",
    "vietnam",
    "yemen",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JurisdictionClass {
    Sanctioned,
    FatfBlackList,
    FatfGreyList,
    EuHighRisk,
    Standard,
}

fn listed(list: &[&str], jurisdiction: &str) -> bool {
    let j = jurisdiction.trim().to_lowercase();
    list.iter().any(|&c| j.contains(c))
}

pub fn classify(jurisdiction: &str) -> JurisdictionClass {
    if listed(SANCTIONED, jurisdiction) {
        JurisdictionClass::Sanctioned
    } else if listed(FATF_BLACK_LIST, jurisdiction) {
        JurisdictionClass::FatfBlackList
    } else if listed(FATF_GREY_LIST, jurisdiction) {
        JurisdictionClass::FatfGreyList
    } else if listed(EU_HIGH_RISK, jurisdiction) {
        JurisdictionClass::EuHighRisk
    } else {
        JurisdictionClass::Standard
    }
}

/// Raw geographic score on the 0-100 scale.
pub fn raw_score(class: JurisdictionClass) -> Score {
    match class {
        JurisdictionClass::Sanctioned | JurisdictionClass::FatfBlackList => dec!(100),
        JurisdictionClass::FatfGreyList => dec!(80),
        JurisdictionClass::EuHighRisk => dec!(70),
        JurisdictionClass::Standard => dec!(10),
    }
}
