pub mod aggregator;
pub mod category;
pub mod config;
pub mod jurisdiction;

pub use aggregator::{aggregate, RiskCalculationResult, CALCULATION_METHOD};
pub use category::{score_categories, CategoryScore, RiskFactorInput, RiskFactorPayload, StrategyRegistry};
pub use config::{
    CategoryConfig, CategoryKey, ConfigurationStore, MitigationRule, RiskThreshold,
    ScoringConfiguration,
};

use crate::KycRiskResult;

/// Score and aggregate in one pass. Pure: identical inputs and configuration
/// version give an identical result.
pub fn calculate_risk(
    config: &ScoringConfiguration,
    payload: &RiskFactorPayload,
    registry: &StrategyRegistry,
) -> KycRiskResult<RiskCalculationResult> {
    let category_scores = score_categories(config, payload, registry)?;
    Ok(aggregate(config, category_scores, payload))
}


#[cfg(test)]
mod tests {
    use super::*;
    use fixtures::sample_config;
    use rust_decimal_macros::dec;

    #[test]
    fn test_calculate_risk_is_deterministic() {
        let config = sample_config("v1");
        let payload = RiskFactorPayload::new()
            .with_direct("sanctions", dec!(80))
            .with_direct("geography", dec!(20))
            .with_control("enhanced_monitoring");
        let registry = StrategyRegistry::with_defaults();
        let a = calculate_risk(&config, &payload, &registry).unwrap();
        let b = calculate_risk(&config, &payload, &registry).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert_eq!(a.adjusted_score, dec!(41.4));
    }
}
