use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::{CategoryKey, ScoringConfiguration};
use super::jurisdiction;
use crate::documents::DocumentEvidence;
use crate::error::KycRiskError;
use crate::pep::PepRiskFactor;
use crate::types::{Score, Weight};
use crate::KycRiskResult;

/// Upper bound of every documented raw score range.
pub const MAX_RAW_SCORE: Score = dec!(100);

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    RetailBanking,
    PrivateBanking,
    CorrespondentBanking,
    TradeFinance,
    FundInvestment,
    CustodyServices,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    FaceToFace,
    Online,
    IntroducedBusiness,
    ThirdParty,
}

/// One hit reported by the screening/sanctions feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctionsHit {
    pub list: String,
    /// Match strength on the 0-100 scale.
    pub match_strength: Score,
    #[serde(default)]
    pub confirmed: bool,
}

/// Raw input for a single category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskFactorInput {
    /// Raw score already computed by an upstream rule engine.
    Direct { raw_score: Score },
    Sanctions { hits: Vec<SanctionsHit> },
    Geography { jurisdictions: Vec<String> },
    Pep(PepRiskFactor),
    Product { product: ProductType, channel: Channel },
    Documents(DocumentEvidence),
}

impl RiskFactorInput {
    pub fn kind(&self) -> &'static str {
        match self {
            RiskFactorInput::Direct { .. } => "direct",
            RiskFactorInput::Sanctions { .. } => "sanctions",
            RiskFactorInput::Geography { .. } => "geography",
            RiskFactorInput::Pep(_) => "pep",
            RiskFactorInput::Product { .. } => "product",
            RiskFactorInput::Documents(_) => "documents",
        }
    }
}

/// Raw risk-factor payload for one dossier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskFactorPayload {
    #[serde(default)]
    pub factors: BTreeMap<CategoryKey, RiskFactorInput>,
    /// Compensating controls in place (matched against mitigation rules).
    #[serde(default)]
    pub controls: BTreeSet<String>,
}

impl RiskFactorPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factor(mut self, category: impl Into<CategoryKey>, input: RiskFactorInput) -> Self {
        self.factors.insert(category.into(), input);
        self
    }

    pub fn with_direct(self, category: impl Into<CategoryKey>, raw_score: Score) -> Self {
        self.with_factor(category, RiskFactorInput::Direct { raw_score })
    }

    pub fn with_control(mut self, control: impl Into<String>) -> Self {
        self.controls.insert(control.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Category score
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct CategoryScoreParts {
    raw_score: Score,
    weight: Weight,
}

/// Raw and weighted score for one category. The weighted score is always
/// derived from its inputs, including when deserialised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CategoryScoreParts")]
pub struct CategoryScore {
    raw_score: Score,
    weight: Weight,
    weighted_score: Score,
}

impl From<CategoryScoreParts> for CategoryScore {
    fn from(parts: CategoryScoreParts) -> Self {
        CategoryScore::new(parts.raw_score, parts.weight)
    }
}

impl CategoryScore {
    pub fn new(raw_score: Score, weight: Weight) -> Self {
        CategoryScore {
            raw_score,
            weight,
            weighted_score: raw_score * weight,
        }
    }

    pub fn raw_score(&self) -> Score {
        self.raw_score
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn weighted_score(&self) -> Score {
        self.weighted_score
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Converts one category's input into a raw score in [0, 100].
pub trait CategoryStrategy: Send + Sync {
    fn raw_score(&self, category: &CategoryKey, input: &RiskFactorInput) -> KycRiskResult<Score>;
}

fn mismatch(category: &CategoryKey, expected: &str, input: &RiskFactorInput) -> KycRiskError {
    KycRiskError::validation(
        category.as_str(),
        format!("expected '{}' input, got '{}'", expected, input.kind()),
    )
}

fn check_range(category: &CategoryKey, score: Score) -> KycRiskResult<Score> {
    if score < Decimal::ZERO || score > MAX_RAW_SCORE {
        return Err(KycRiskError::validation(
            category.as_str(),
            format!("raw score {} outside [0, {}]", score, MAX_RAW_SCORE),
        ));
    }
    Ok(score)
}

/// Strongest match plus 5 per additional confirmed hit.
pub struct SanctionsStrategy;

impl CategoryStrategy for SanctionsStrategy {
    fn raw_score(&self, category: &CategoryKey, input: &RiskFactorInput) -> KycRiskResult<Score> {
        let RiskFactorInput::Sanctions { hits } = input else {
            return Err(mismatch(category, "sanctions", input));
        };
        let mut strongest = Decimal::ZERO;
        for hit in hits {
            check_range(category, hit.match_strength)?;
            strongest = strongest.max(hit.match_strength);
        }
        let confirmed = hits.iter().filter(|h| h.confirmed).count() as i64;
        let extra = Decimal::from((confirmed - 1).max(0)) * dec!(5);
        Ok((strongest + extra).min(MAX_RAW_SCORE))
    }
}

/// Highest-risk jurisdiction wins.
pub struct GeographyStrategy;

impl CategoryStrategy for GeographyStrategy {
    fn raw_score(&self, category: &CategoryKey, input: &RiskFactorInput) -> KycRiskResult<Score> {
        let RiskFactorInput::Geography { jurisdictions } = input else {
            return Err(mismatch(category, "geography", input));
        };
        Ok(jurisdictions
            .iter()
            .map(|j| jurisdiction::raw_score(jurisdiction::classify(j)))
            .max()
            .unwrap_or(Decimal::ZERO))
    }
}

pub struct PepStrategy;

impl CategoryStrategy for PepStrategy {
    fn raw_score(&self, category: &CategoryKey, input: &RiskFactorInput) -> KycRiskResult<Score> {
        match input {
            RiskFactorInput::Pep(factor) => Ok(factor.raw_score()),
            other => Err(mismatch(category, "pep", other)),
        }
    }
}

pub struct ProductStrategy;

impl CategoryStrategy for ProductStrategy {
    fn raw_score(&self, category: &CategoryKey, input: &RiskFactorInput) -> KycRiskResult<Score> {
        let RiskFactorInput::Product { product, channel } = input else {
            return Err(mismatch(category, "product", input));
        };
        let base = match product {
            ProductType::RetailBanking => dec!(20),
            ProductType::CustodyServices => dec!(35),
            ProductType::FundInvestment => dec!(40),
            ProductType::PrivateBanking => dec!(50),
            ProductType::CorrespondentBanking => dec!(75),
            ProductType::TradeFinance => dec!(100),
        };
        let surcharge = match channel {
            Channel::FaceToFace => dec!(0),
            Channel::IntroducedBusiness => dec!(10),
            Channel::Online => dec!(15),
            Channel::ThirdParty => dec!(20),
        };
        Ok((base + surcharge).min(MAX_RAW_SCORE))
    }
}

pub struct DocumentsStrategy;

impl CategoryStrategy for DocumentsStrategy {
    fn raw_score(&self, category: &CategoryKey, input: &RiskFactorInput) -> KycRiskResult<Score> {
        match input {
            RiskFactorInput::Documents(evidence) => Ok(evidence.raw_score()),
            other => Err(mismatch(category, "documents", other)),
        }
    }
}

/// Strategies keyed by category name. `Direct` inputs bypass the registry.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<CategoryKey, Arc<dyn CategoryStrategy>>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(CategoryKey::SANCTIONS, SanctionsStrategy);
        registry.register(CategoryKey::GEOGRAPHY, GeographyStrategy);
        registry.register(CategoryKey::PEP, PepStrategy);
        registry.register(CategoryKey::PRODUCT, ProductStrategy);
        registry.register(CategoryKey::DOCUMENTS, DocumentsStrategy);
        registry
    }

    pub fn register(
        &mut self,
        category: impl Into<CategoryKey>,
        strategy: impl CategoryStrategy + 'static,
    ) {
        self.strategies.insert(category.into(), Arc::new(strategy));
    }

    pub fn raw_score(&self, category: &CategoryKey, input: &RiskFactorInput) -> KycRiskResult<Score> {
        let score = match input {
            RiskFactorInput::Direct { raw_score } => *raw_score,
            _ => {
                let strategy = self.strategies.get(category).ok_or_else(|| {
                    KycRiskError::validation(
                        category.as_str(),
                        "no scoring strategy registered for category",
                    )
                })?;
                strategy.raw_score(category, input)?
            }
        };
        check_range(category, score)
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Score every active category of `config`. Absent inputs score 0 unless
/// the category is mandatory.
pub fn score_categories(
    config: &ScoringConfiguration,
    payload: &RiskFactorPayload,
    registry: &StrategyRegistry,
) -> KycRiskResult<BTreeMap<CategoryKey, CategoryScore>> {
    let mut scores = BTreeMap::new();

    for (key, category) in config.active_categories() {
        let raw = match payload.factors.get(key) {
            Some(input) => registry.raw_score(key, input)?,
            None if category.mandatory => {
                return Err(KycRiskError::validation(
                    key.as_str(),
                    "mandatory category input is missing",
                ));
            }
            None => Decimal::ZERO,
        };
        scores.insert(key.clone(), CategoryScore::new(raw, category.weight));
    }

    for key in payload.factors.keys() {
        if !scores.contains_key(key) {
            debug!(
                category = %key,
                configuration_version = %config.version,
                "Ignoring input for category not active in configuration"
            );
        }
    }

    Ok(scores)
}
