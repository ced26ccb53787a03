use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::KycRiskError;
use crate::types::{Factor, RiskLevel, Score, Weight};
use crate::KycRiskResult;

// ---------------------------------------------------------------------------
// Category keys
// ---------------------------------------------------------------------------

/// Name of a risk category as declared by a scoring configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CategoryKey(String);

impl CategoryKey {
    pub const SANCTIONS: &'static str = "sanctions";
    pub const GEOGRAPHY: &'static str = "geography";
    pub const PEP: &'static str = "pep";
    pub const PRODUCT: &'static str = "product";
    pub const DOCUMENTS: &'static str = "documents";

    pub fn new(name: impl Into<String>) -> Self {
        CategoryKey(name.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CategoryKey {
    fn from(s: &str) -> Self {
        CategoryKey::new(s)
    }
}

impl From<String> for CategoryKey {
    fn from(s: String) -> Self {
        CategoryKey::new(s)
    }
}

impl From<CategoryKey> for String {
    fn from(key: CategoryKey) -> Self {
        key.0
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Configuration document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub weight: Weight,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Compensating controls that reduce exposure when this category was
    /// assessed and the control is present in the payload.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mitigations: Vec<MitigationRule>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationRule {
    pub control: String,
    pub factor: Factor,
}

/// Lower bound (inclusive) of a risk level band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskThreshold {
    pub min_score: Score,
    pub level: RiskLevel,
}

/// A published weight/threshold/mitigation table. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfiguration {
    pub version: String,
    pub categories: BTreeMap<CategoryKey, CategoryConfig>,
    pub thresholds: Vec<RiskThreshold>,
}

impl CategoryConfig {
    pub fn new(weight: Weight) -> Self {
        CategoryConfig {
            weight,
            mandatory: false,
            active: true,
            mitigations: Vec::new(),
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_mitigation(mut self, control: impl Into<String>, factor: Factor) -> Self {
        self.mitigations.push(MitigationRule {
            control: control.into(),
            factor,
        });
        self
    }
}

impl ScoringConfiguration {
    pub fn active_categories(&self) -> impl Iterator<Item = (&CategoryKey, &CategoryConfig)> {
        self.categories.iter().filter(|(_, c)| c.active)
    }

    /// Highest threshold at or below `score`; the lowest band when the score
    /// sits under every threshold.
    pub fn level_for(&self, score: Score) -> RiskLevel {
        let mut level = match self.thresholds.first() {
            Some(t) => t.level,
            None => RiskLevel::Low,
        };
        for t in &self.thresholds {
            if t.min_score <= score {
                level = t.level;
            }
        }
        level
    }

    pub fn validate(&self) -> KycRiskResult<()> {
        let err = |reason: String| KycRiskError::configuration(self.version.clone(), reason);

        if self.version.trim().is_empty() {
            return Err(err("version identifier must not be empty".to_string()));
        }
        if self.active_categories().next().is_none() {
            return Err(err("at least one active category is required".to_string()));
        }
        for (key, cat) in &self.categories {
            if key.as_str().is_empty() {
                return Err(err("category names must not be empty".to_string()));
            }
            if cat.weight < Decimal::ZERO || cat.weight > Decimal::ONE {
                return Err(err(format!(
                    "weight for '{}' must be within [0, 1], got {}",
                    key, cat.weight
                )));
            }
            let mut controls = BTreeSet::new();
            for rule in &cat.mitigations {
                if rule.control.trim().is_empty() {
                    return Err(err(format!("mitigation control on '{}' is blank", key)));
                }
                if rule.factor < Decimal::ZERO || rule.factor > Decimal::ONE {
                    return Err(err(format!(
                        "mitigation factor for '{}' on '{}' must be within [0, 1], got {}",
                        rule.control, key, rule.factor
                    )));
                }
                if !controls.insert(rule.control.as_str()) {
                    return Err(err(format!(
                        "mitigation control '{}' declared twice on '{}'",
                        rule.control, key
                    )));
                }
            }
        }
        if self.thresholds.is_empty() {
            return Err(err("at least one risk threshold is required".to_string()));
        }
        for pair in self.thresholds.windows(2) {
            if pair[1].min_score <= pair[0].min_score {
                return Err(err(format!(
                    "thresholds must be strictly ascending ({} then {})",
                    pair[0].min_score, pair[1].min_score
                )));
            }
            if pair[1].level < pair[0].level {
                return Err(err(format!(
                    "threshold levels must not decrease ({} then {})",
                    pair[0].level, pair[1].level
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Versioned store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StoreState {
    versions: BTreeMap<String, Arc<ScoringConfiguration>>,
    active: Option<String>,
}

/// Holds every published configuration version. Published content is never
/// replaced; tuning produces a new version.
#[derive(Debug, Default)]
pub struct ConfigurationStore {
    state: RwLock<StoreState>,
}

impl ConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and publish. Re-publishing identical content is a no-op;
    /// different content under an existing version is rejected.
    pub fn publish(&self, config: ScoringConfiguration) -> KycRiskResult<Arc<ScoringConfiguration>> {
        config.validate()?;
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());
        if let Some(existing) = state.versions.get(&config.version) {
            if **existing == config {
                return Ok(Arc::clone(existing));
            }
            warn!(
                configuration_version = %config.version,
                "Rejected attempt to mutate a published scoring configuration"
            );
            return Err(KycRiskError::configuration(
                config.version,
                "version already published with different content",
            ));
        }
        let version = config.version.clone();
        let config = Arc::new(config);
        state.versions.insert(version.clone(), Arc::clone(&config));
        if state.active.is_none() {
            state.active = Some(version.clone());
        }
        info!(configuration_version = %version, "Published scoring configuration");
        Ok(config)
    }

    pub fn activate(&self, version: &str) -> KycRiskResult<()> {
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());
        if !state.versions.contains_key(version) {
            return Err(KycRiskError::configuration(version, "version does not exist"));
        }
        state.active = Some(version.to_string());
        info!(configuration_version = %version, "Activated scoring configuration");
        Ok(())
    }

    pub fn get(&self, version: &str) -> KycRiskResult<Arc<ScoringConfiguration>> {
        if version.trim().is_empty() {
            return Err(KycRiskError::validation(
                "configuration_version",
                "configuration reference must not be blank",
            ));
        }
        let state = self.state.read().unwrap_or_else(|p| p.into_inner());
        state
            .versions
            .get(version)
            .cloned()
            .ok_or_else(|| KycRiskError::configuration(version, "version does not exist"))
    }

    pub fn active(&self) -> KycRiskResult<Arc<ScoringConfiguration>> {
        let state = self.state.read().unwrap_or_else(|p| p.into_inner());
        let version = state
            .active
            .as_deref()
            .ok_or_else(|| KycRiskError::configuration("<none>", "no active configuration"))?;
        state
            .versions
            .get(version)
            .cloned()
            .ok_or_else(|| KycRiskError::configuration(version, "version does not exist"))
    }

    /// Resolve an explicit version if given, else the active one.
    pub fn resolve(&self, version: Option<&str>) -> KycRiskResult<Arc<ScoringConfiguration>> {
        match version {
            Some(v) => self.get(v),
            None => self.active(),
        }
    }

    pub fn versions(&self) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(|p| p.into_inner());
        state.versions.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::fixtures::sample_config;
    use rust_decimal_macros::dec;

    #[test]
    fn test_level_for_bands() {
        let config = sample_config("v1");
        assert_eq!(config.level_for(dec!(10)), RiskLevel::Low);
        assert_eq!(config.level_for(dec!(25)), RiskLevel::Medium);
        assert_eq!(config.level_for(dec!(41.4)), RiskLevel::Medium);
        assert_eq!(config.level_for(dec!(50)), RiskLevel::High);
        assert_eq!(config.level_for(dec!(500)), RiskLevel::High);
    }

    #[test]
    fn test_below_lowest_threshold_gets_lowest_level() {
        let mut config = sample_config("v1");
        config.thresholds[0].min_score = dec!(5);
        assert_eq!(config.level_for(dec!(1)), RiskLevel::Low);
    }

    #[test]
    fn test_weight_out_of_range_rejected() {
        let mut config = sample_config("v1");
        config
            .categories
            .insert(CategoryKey::from("product"), CategoryConfig::new(dec!(1.5)));
        assert!(matches!(
            config.validate(),
            Err(KycRiskError::Configuration { .. })
        ));
    }

    #[test]
    fn test_descending_thresholds_rejected() {
        let mut config = sample_config("v1");
        config.thresholds.swap(1, 2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_decreasing_levels_rejected() {
        let mut config = sample_config("v1");
        config.thresholds[2].level = RiskLevel::Low;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mitigation_factor_out_of_range_rejected() {
        let mut config = sample_config("v1");
        config.categories.insert(
            CategoryKey::from("product"),
            CategoryConfig::new(dec!(0.1)).with_mitigation("escrow", dec!(1.2)),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_publish_same_content_is_noop() {
        let store = ConfigurationStore::new();
        store.publish(sample_config("v1")).unwrap();
        store.publish(sample_config("v1")).unwrap();
        assert_eq!(store.versions(), vec!["v1".to_string()]);
    }

    #[test]
    fn test_publish_refuses_to_mutate_version() {
        let store = ConfigurationStore::new();
        store.publish(sample_config("v1")).unwrap();
        let mut changed = sample_config("v1");
        changed.thresholds[1].min_score = dec!(30);
        assert!(matches!(
            store.publish(changed),
            Err(KycRiskError::Configuration { .. })
        ));
        assert_eq!(store.get("v1").unwrap().thresholds[1].min_score, dec!(25));
    }

    #[test]
    fn test_first_published_becomes_active() {
        let store = ConfigurationStore::new();
        store.publish(sample_config("v1")).unwrap();
        store.publish(sample_config("v2")).unwrap();
        assert_eq!(store.active().unwrap().version, "v1");
        store.activate("v2").unwrap();
        assert_eq!(store.active().unwrap().version, "v2");
    }

    #[test]
    fn test_unknown_version_is_configuration_error() {
        let store = ConfigurationStore::new();
        assert!(matches!(
            store.get("v9"),
            Err(KycRiskError::Configuration { .. })
        ));
        assert!(matches!(
            store.activate("v9"),
            Err(KycRiskError::Configuration { .. })
        ));
    }

    #[test]
    fn test_blank_reference_is_validation_error() {
        let store = ConfigurationStore::new();
        assert!(matches!(store.get("  "), Err(KycRiskError::Validation { .. })));
    }

    #[test]
    fn test_category_key_normalised() {
        assert_eq!(CategoryKey::new(" Sanctions "), CategoryKey::from("sanctions"));
        let key: CategoryKey = serde_json::from_str("\"Geography\"").unwrap();
        assert_eq!(key.as_str(), "geography");
    }
}
