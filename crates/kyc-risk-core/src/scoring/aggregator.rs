use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::category::{CategoryScore, RiskFactorPayload};
use super::config::{CategoryKey, ScoringConfiguration};
use crate::types::{Factor, RiskLevel, Score};

/// Identifier of the aggregation algorithm, versioned independently of
/// the weight tables.
pub const CALCULATION_METHOD: &str = "WEIGHTED_SUM_MITIGATED_V1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedMitigation {
    pub category: CategoryKey,
    pub control: String,
    pub factor: Factor,
}

/// Outcome of one evaluation run. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCalculationResult {
    pub category_scores: BTreeMap<CategoryKey, CategoryScore>,
    pub gross_score: Score,
    pub mitigation_factor: Factor,
    pub applied_mitigations: Vec<AppliedMitigation>,
    pub adjusted_score: Score,
    pub risk_level: RiskLevel,
    pub calculation_method: String,
    pub configuration_version: String,
}

/// Product of every mitigation rule whose control is present and whose
/// category was assessed, clamped to [0, 1].
pub fn mitigation_factor(
    config: &ScoringConfiguration,
    payload: &RiskFactorPayload,
) -> (Factor, Vec<AppliedMitigation>) {
    let mut factor = Decimal::ONE;
    let mut applied = Vec::new();

    for (key, category) in config.active_categories() {
        if !payload.factors.contains_key(key) {
            continue;
        }
        for rule in &category.mitigations {
            if payload.controls.contains(&rule.control) {
                factor *= rule.factor;
                applied.push(AppliedMitigation {
                    category: key.clone(),
                    control: rule.control.clone(),
                    factor: rule.factor,
                });
            }
        }
    }

    (factor.max(Decimal::ZERO).min(Decimal::ONE), applied)
}

/// Deterministic fold of category scores into a classified result.
pub fn aggregate(
    config: &ScoringConfiguration,
    category_scores: BTreeMap<CategoryKey, CategoryScore>,
    payload: &RiskFactorPayload,
) -> RiskCalculationResult {
    let gross_score: Score = category_scores
        .values()
        .map(CategoryScore::weighted_score)
        .sum();
    let (mitigation_factor, applied_mitigations) = mitigation_factor(config, payload);
    let adjusted_score = gross_score * mitigation_factor;
    let risk_level = config.level_for(adjusted_score);

    RiskCalculationResult {
        category_scores,
        gross_score,
        mitigation_factor,
        applied_mitigations,
        adjusted_score,
        risk_level,
        calculation_method: CALCULATION_METHOD.to_string(),
        configuration_version: config.version.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::config::CategoryConfig;
    use crate::scoring::fixtures::sample_config;
    use rust_decimal_macros::dec;

    fn scores(pairs: &[(&str, Decimal, Decimal)]) -> BTreeMap<CategoryKey, CategoryScore> {
        pairs
            .iter()
            .map(|(k, raw, w)| (CategoryKey::from(*k), CategoryScore::new(*raw, *w)))
            .collect()
    }

    #[test]
    fn test_gross_is_sum_of_weighted() {
        let config = sample_config("v1");
        let result = aggregate(
            &config,
            scores(&[
                ("sanctions", dec!(80), dec!(0.5)),
                ("geography", dec!(20), dec!(0.3)),
                ("pep", dec!(0), dec!(0.2)),
            ]),
            &RiskFactorPayload::new(),
        );
        assert_eq!(result.gross_score, dec!(46));
        assert_eq!(result.mitigation_factor, Decimal::ONE);
        assert_eq!(result.adjusted_score, dec!(46));
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert_eq!(result.calculation_method, CALCULATION_METHOD);
        assert_eq!(result.configuration_version, "v1");
    }

    #[test]
    fn test_mitigation_requires_control_and_assessed_category() {
        let config = sample_config("v1");
        let control_only = RiskFactorPayload::new().with_control("enhanced_monitoring");
        assert_eq!(mitigation_factor(&config, &control_only).0, Decimal::ONE);

        let both = control_only.with_direct("sanctions", dec!(10));
        let (factor, applied) = mitigation_factor(&config, &both);
        assert_eq!(factor, dec!(0.9));
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].control, "enhanced_monitoring");
    }

    #[test]
    fn test_multiple_mitigations_multiply() {
        let mut config = sample_config("v1");
        config.categories.insert(
            CategoryKey::from("geography"),
            CategoryConfig::new(dec!(0.3)).with_mitigation("local_branch_review", dec!(0.5)),
        );
        let payload = RiskFactorPayload::new()
            .with_direct("sanctions", dec!(10))
            .with_direct("geography", dec!(10))
            .with_control("enhanced_monitoring")
            .with_control("local_branch_review");
        let (factor, applied) = mitigation_factor(&config, &payload);
        assert_eq!(factor, dec!(0.45));
        assert_eq!(applied.len(), 2);
    }

    #[test]
    fn test_zero_factor_zeroes_adjusted_score() {
        let mut config = sample_config("v1");
        config.categories.insert(
            CategoryKey::from("pep"),
            CategoryConfig::new(dec!(0.2)).with_mitigation("exited_relationship", dec!(0)),
        );
        let payload = RiskFactorPayload::new()
            .with_direct("pep", dec!(80))
            .with_control("exited_relationship");
        let result = aggregate(&config, scores(&[("pep", dec!(80), dec!(0.2))]), &payload);
        assert_eq!(result.adjusted_score, Decimal::ZERO);
        assert_eq!(result.risk_level, RiskLevel::Low);
    }
}
