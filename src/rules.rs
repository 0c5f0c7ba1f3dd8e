use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RulesError;
use crate::models::MarketSegment;

/// Question ids read directly by the aggregation passes.
pub mod questions {
    pub const CHALLENGE_TEXT: &str = "3.1";
    pub const TIME_SPENT: &str = "3.3";
    pub const DELIVERY_FEE: &str = "5.1";
    pub const SHOPPING_FREQUENCY: &str = "6.1";
    pub const DELIVERY_ACCESS: &str = "9.2";

    /// Questions the aggregation passes read as free text.
    pub const FREE_TEXT: [&str; 4] = [CHALLENGE_TEXT, TIME_SPENT, DELIVERY_FEE, DELIVERY_ACCESS];
}

/// Maps a factor name to the survey question it is scored against.
/// Factors without a question never match.
pub fn question_for_factor(factor: &str) -> Option<&'static str> {
    let question = match factor {
        "ageRange" => "1.2",
        "household" => "1.3",
        "workStatus" => "1.4",
        "transport" => "1.5",
        "pricePreference" => "1.6",
        "children" => "1.7",
        "shoppingFreq" => "6.1",
        "spendingRange" => "6.2",
        "basketSize" => "6.3",
        "challenges" => "3.4",
        "timeSpent" => "3.3",
        "deliveryFee" => "5.1",
        "trustSource" => "10.1",
        "access" => "9.2",
        "internet" => "9.4",
        "coldChain" => "9.3",
        "decisionMaker" => "8.1",
        _ => return None,
    };
    Some(question)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorRule {
    pub factor: String,
    pub accepted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRule {
    pub segment: MarketSegment,
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub factors: Vec<FactorRule>,
}

fn default_weight() -> f64 {
    1.0
}

/// Ordered segment rules. Order is the tie-break order for classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    pub segments: Vec<SegmentRule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RuleTable {
    pub fn from_json(input: &str) -> Result<Self, RulesError> {
        let table: RuleTable = serde_json::from_str(input)?;
        table.validate()?;
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self, RulesError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    fn validate(&self) -> Result<(), RulesError> {
        let mut seen = HashSet::new();
        for rule in &self.segments {
            if !seen.insert(rule.segment) {
                return Err(RulesError::DuplicateSegment(rule.segment.to_string()));
            }
            if !rule.weight.is_finite() || rule.weight <= 0.0 {
                return Err(RulesError::InvalidWeight {
                    segment: rule.segment.to_string(),
                    weight: rule.weight,
                });
            }
            if rule.factors.is_empty() {
                return Err(RulesError::NoFactors(rule.segment.to_string()));
            }
        }
        Ok(())
    }

    /// The grocery-delivery rule set the survey was designed around.
    pub fn standard() -> Self {
        use MarketSegment::*;

        let segments = vec![
            segment(
                UrbanProfessionals,
                1.0,
                &[
                    ("ageRange", &["25–40", "40–60"]),
                    ("workStatus", &["Working full-time", "Working part-time"]),
                    ("transport", &["By car", "Taxi/ride-sharing"]),
                    (
                        "pricePreference",
                        &["Mix of price and quality", "Premium/high-quality products"],
                    ),
                    (
                        "timeSpent",
                        &["1-2 hours - somewhat bothersome", "2+ hours - very frustrating"],
                    ),
                    (
                        "spendingRange",
                        &["5,000-8,000 DZD", "8,000-15,000 DZD", "Over 15,000 DZD"],
                    ),
                ],
            ),
            segment(
                MiddleClassFamilies,
                1.0,
                &[
                    (
                        "household",
                        &["Small family (3-4 people)", "Large family (5+ people)"],
                    ),
                    (
                        "children",
                        &[
                            "Yes, young children (under 12)",
                            "Yes, teenagers (12-18)",
                            "Yes, adult children living at home",
                        ],
                    ),
                    (
                        "workStatus",
                        &[
                            "Working full-time",
                            "Working part-time",
                            "Managing household/homemaker",
                        ],
                    ),
                    (
                        "pricePreference",
                        &["Mix of price and quality", "Usually cheapest options"],
                    ),
                    ("shoppingFreq", &["3-4 times", "5-8 times"]),
                    ("spendingRange", &["2,000-5,000 DZD", "5,000-8,000 DZD"]),
                ],
            ),
            segment(
                Elders,
                1.2,
                &[
                    ("ageRange", &["Above 60"]),
                    ("workStatus", &["Retired", "Managing household/homemaker"]),
                    ("transport", &["Walking", "By bus/public transport"]),
                    ("challenges", &["Carrying heavy bags", "Transport to/from store"]),
                    (
                        "timeSpent",
                        &["1-2 hours - somewhat bothersome", "2+ hours - very frustrating"],
                    ),
                    ("trustSource", &["Family members", "Neighbors"]),
                ],
            ),
            segment(
                Students,
                1.1,
                &[
                    ("ageRange", &["Under 25"]),
                    ("workStatus", &["Student"]),
                    ("household", &["Live alone (1 person)", "With roommates"]),
                    ("pricePreference", &["Usually cheapest options"]),
                    ("spendingRange", &["Under 2,000 DZD", "2,000-5,000 DZD"]),
                    ("transport", &["Walking", "By bus/public transport"]),
                ],
            ),
            segment(
                HighIncomeHouseholds,
                0.9,
                &[
                    ("pricePreference", &["Premium/high-quality products"]),
                    ("spendingRange", &["8,000-15,000 DZD", "Over 15,000 DZD"]),
                    ("transport", &["By car", "Taxi/ride-sharing"]),
                    (
                        "deliveryFee",
                        &["400+ DZD is fine", "Would depend on service quality"],
                    ),
                    ("coldChain", &["Yes, cold chain very important"]),
                ],
            ),
            segment(
                RuralPeriUrban,
                1.0,
                &[
                    (
                        "transport",
                        &["By bus/public transport", "Walking", "Bicycle/motorcycle"],
                    ),
                    (
                        "access",
                        &[
                            "Some parking challenges",
                            "Difficult access",
                            "Very difficult access",
                        ],
                    ),
                    (
                        "internet",
                        &[
                            "Internet sometimes unreliable",
                            "Would need call/SMS backup",
                            "Prefer phone orders anyway",
                        ],
                    ),
                    ("shoppingFreq", &["1-2 times", "3-4 times"]),
                    ("basketSize", &["Always big baskets", "Usually big baskets"]),
                ],
            ),
            segment(
                SingleParents,
                1.1,
                &[
                    (
                        "household",
                        &["Small family (3-4 people)", "Large family (5+ people)"],
                    ),
                    (
                        "children",
                        &["Yes, young children (under 12)", "Yes, teenagers (12-18)"],
                    ),
                    (
                        "workStatus",
                        &[
                            "Working full-time",
                            "Working part-time",
                            "Managing household/homemaker",
                        ],
                    ),
                    (
                        "challenges",
                        &["Carrying heavy bags", "Transport to/from store", "Crowded stores"],
                    ),
                    (
                        "timeSpent",
                        &["1-2 hours - somewhat bothersome", "2+ hours - very frustrating"],
                    ),
                    ("decisionMaker", &["I would decide myself"]),
                ],
            ),
        ];

        RuleTable { segments }
    }
}

fn segment(segment: MarketSegment, weight: f64, factors: &[(&str, &[&str])]) -> SegmentRule {
    SegmentRule {
        segment,
        weight,
        factors: factors
            .iter()
            .map(|(factor, accepted)| FactorRule {
                factor: factor.to_string(),
                accepted: accepted.iter().map(|value| value.to_string()).collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_covers_every_segment_in_order() {
        let table = RuleTable::standard();
        let order: Vec<MarketSegment> = table.segments.iter().map(|rule| rule.segment).collect();
        assert_eq!(order, MarketSegment::ALL.to_vec());
        assert!(table.validate().is_ok());
    }

    #[test]
    fn every_standard_factor_has_a_question() {
        for rule in RuleTable::standard().segments {
            for factor in rule.factors {
                assert!(
                    question_for_factor(&factor.factor).is_some(),
                    "{} has no question",
                    factor.factor
                );
            }
        }
        assert_eq!(question_for_factor("favouriteColour"), None);
    }

    #[test]
    fn json_tables_default_weight_and_validate() {
        let table = RuleTable::from_json(
            r#"{"segments": [{"segment": "Students", "factors": [
                {"factor": "ageRange", "accepted": ["Under 25"]}
            ]}]}"#,
        )
        .unwrap();
        assert_eq!(table.segments[0].weight, 1.0);

        let duplicate = RuleTable::from_json(
            r#"{"segments": [
                {"segment": "Elders", "factors": [{"factor": "ageRange", "accepted": []}]},
                {"segment": "Elders", "factors": [{"factor": "ageRange", "accepted": []}]}
            ]}"#,
        );
        assert!(matches!(duplicate, Err(RulesError::DuplicateSegment(_))));

        let empty = RuleTable::from_json(
            r#"{"segments": [{"segment": "Elders", "weight": 1.0, "factors": []}]}"#,
        );
        assert!(matches!(empty, Err(RulesError::NoFactors(_))));

        let negative = RuleTable::from_json(
            r#"{"segments": [{"segment": "Elders", "weight": -1.0,
                "factors": [{"factor": "ageRange", "accepted": []}]}]}"#,
        );
        assert!(matches!(negative, Err(RulesError::InvalidWeight { .. })));
    }
}
