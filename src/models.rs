use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AnswerError, UnknownSegment};

/// Consumer archetypes used for targeting, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MarketSegment {
    #[serde(rename = "Urban Professionals")]
    UrbanProfessionals,
    #[serde(rename = "Middle-Class Families")]
    MiddleClassFamilies,
    #[serde(rename = "Elders")]
    Elders,
    #[serde(rename = "Students")]
    Students,
    #[serde(rename = "High-Income Households")]
    HighIncomeHouseholds,
    #[serde(rename = "Rural/Peri-Urban")]
    RuralPeriUrban,
    #[serde(rename = "Single Parents")]
    SingleParents,
}

impl MarketSegment {
    pub const ALL: [MarketSegment; 7] = [
        MarketSegment::UrbanProfessionals,
        MarketSegment::MiddleClassFamilies,
        MarketSegment::Elders,
        MarketSegment::Students,
        MarketSegment::HighIncomeHouseholds,
        MarketSegment::RuralPeriUrban,
        MarketSegment::SingleParents,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MarketSegment::UrbanProfessionals => "Urban Professionals",
            MarketSegment::MiddleClassFamilies => "Middle-Class Families",
            MarketSegment::Elders => "Elders",
            MarketSegment::Students => "Students",
            MarketSegment::HighIncomeHouseholds => "High-Income Households",
            MarketSegment::RuralPeriUrban => "Rural/Peri-Urban",
            MarketSegment::SingleParents => "Single Parents",
        }
    }
}

impl fmt::Display for MarketSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MarketSegment {
    type Err = UnknownSegment;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        MarketSegment::ALL
            .into_iter()
            .find(|segment| segment.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownSegment(value.to_string()))
    }
}

/// Analytical dimensions of the segmentation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SegmentationCriteria {
    #[serde(rename = "End User Jobs-to-be-Done")]
    JobsToBeDone,
    #[serde(rename = "Pain Points")]
    PainPoints,
    #[serde(rename = "Competition")]
    Competition,
    #[serde(rename = "Pricing Sensitivity")]
    PricingSensitivity,
    #[serde(rename = "Frequency & AOV")]
    FrequencyAndAov,
    #[serde(rename = "Accessibility")]
    Accessibility,
    #[serde(rename = "Decision-Making Unit (DMU)")]
    DecisionMakingUnit,
    #[serde(rename = "Complementary Assets")]
    ComplementaryAssets,
}

impl SegmentationCriteria {
    pub const ALL: [SegmentationCriteria; 8] = [
        SegmentationCriteria::JobsToBeDone,
        SegmentationCriteria::PainPoints,
        SegmentationCriteria::Competition,
        SegmentationCriteria::PricingSensitivity,
        SegmentationCriteria::FrequencyAndAov,
        SegmentationCriteria::Accessibility,
        SegmentationCriteria::DecisionMakingUnit,
        SegmentationCriteria::ComplementaryAssets,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SegmentationCriteria::JobsToBeDone => "End User Jobs-to-be-Done",
            SegmentationCriteria::PainPoints => "Pain Points",
            SegmentationCriteria::Competition => "Competition",
            SegmentationCriteria::PricingSensitivity => "Pricing Sensitivity",
            SegmentationCriteria::FrequencyAndAov => "Frequency & AOV",
            SegmentationCriteria::Accessibility => "Accessibility",
            SegmentationCriteria::DecisionMakingUnit => "Decision-Making Unit (DMU)",
            SegmentationCriteria::ComplementaryAssets => "Complementary Assets",
        }
    }
}

impl fmt::Display for SegmentationCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single survey answer. Ratings are always within 1..=5.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum AnswerValue {
    Text(String),
    MultiSelect(Vec<String>),
    Rating(u8),
}

impl AnswerValue {
    pub fn rating(value: i64) -> Result<Self, AnswerError> {
        match u8::try_from(value) {
            Ok(rating @ 1..=5) => Ok(AnswerValue::Rating(rating)),
            _ => Err(AnswerError::RatingOutOfRange(value)),
        }
    }

    /// Parses the `kind`/`answer` column pair of an import file.
    pub fn from_import(kind: &str, raw: &str) -> Result<Self, AnswerError> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(AnswerValue::Text(raw.to_string())),
            "multi" => Ok(AnswerValue::MultiSelect(
                raw.split(';')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            "rating" => {
                let value: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| AnswerError::InvalidRating(raw.to_string()))?;
                AnswerValue::rating(value)
            }
            other => Err(AnswerError::UnknownKind(other.to_string())),
        }
    }

    /// Text form used in matched-factor strings and answer tallies.
    pub fn render(&self) -> String {
        match self {
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::MultiSelect(items) => items.join(", "),
            AnswerValue::Rating(rating) => rating.to_string(),
        }
    }

    /// True when any selected value is in `accepted`.
    pub fn matches_any(&self, accepted: &[String]) -> bool {
        match self {
            AnswerValue::Text(text) => accepted.iter().any(|value| value == text),
            AnswerValue::MultiSelect(items) => items
                .iter()
                .any(|item| accepted.iter().any(|value| value == item)),
            AnswerValue::Rating(rating) => {
                let rendered = rating.to_string();
                accepted.iter().any(|value| *value == rendered)
            }
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Text(text) => text.is_empty(),
            AnswerValue::MultiSelect(items) => items.is_empty(),
            AnswerValue::Rating(_) => false,
        }
    }
}

impl TryFrom<Value> for AnswerValue {
    type Error = AnswerError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) => Ok(AnswerValue::Text(text)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(text) => Ok(text),
                    other => Err(AnswerError::UnsupportedShape(other.to_string())),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(AnswerValue::MultiSelect),
            Value::Number(number) => match number.as_i64() {
                Some(rating) => AnswerValue::rating(rating),
                None => Err(AnswerError::UnsupportedShape(number.to_string())),
            },
            other => Err(AnswerError::UnsupportedShape(other.to_string())),
        }
    }
}

impl From<AnswerValue> for Value {
    fn from(answer: AnswerValue) -> Self {
        match answer {
            AnswerValue::Text(text) => Value::String(text),
            AnswerValue::MultiSelect(items) => {
                Value::Array(items.into_iter().map(Value::String).collect())
            }
            AnswerValue::Rating(rating) => Value::from(rating),
        }
    }
}

/// Question id ("3.3") to answer. Unanswered questions are absent.
pub type AnswerSet = BTreeMap<String, AnswerValue>;

/// A completed survey session as delivered by the record store.
#[derive(Debug, Clone)]
pub struct SurveyResponse {
    pub id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub answers: AnswerSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentClassification {
    pub segment: MarketSegment,
    pub probability: f64,
    pub reason_factors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RespondentProfile {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub answers: AnswerSet,
    pub classifications: Vec<SegmentClassification>,
    pub primary_segment: MarketSegment,
    pub confidence: f64,
}

impl RespondentProfile {
    /// Non-empty free-text answer at `question_id`.
    pub fn text_answer(&self, question_id: &str) -> Option<&str> {
        match self.answers.get(question_id)? {
            AnswerValue::Text(text) if text.is_empty() => None,
            AnswerValue::Text(text) => Some(text),
            other => {
                tracing::debug!(
                    respondent = %self.id,
                    question_id,
                    answer = %other.render(),
                    "expected a text answer, ignoring"
                );
                None
            }
        }
    }

    pub fn has_answer(&self, question_id: &str) -> bool {
        self.answers
            .get(question_id)
            .is_some_and(|answer| !answer.is_blank())
    }
}

/// A response as stored, with whatever classification was last persisted.
#[derive(Debug, Clone)]
pub struct StoredRespondent {
    pub id: Uuid,
    pub source_key: String,
    pub submitted_at: DateTime<Utc>,
    pub primary_segment: Option<MarketSegment>,
    pub confidence: Option<f64>,
    pub classifications: Vec<SegmentClassification>,
    pub classified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixCell {
    pub segment: MarketSegment,
    pub criteria: SegmentationCriteria,
    pub respondent_count: usize,
    pub insights: Vec<String>,
    pub key_patterns: Vec<String>,
    pub average_values: BTreeMap<String, f64>,
}

pub type CellKey = (MarketSegment, SegmentationCriteria);

#[derive(Debug, Clone)]
pub struct SegmentationMatrix {
    pub cells: BTreeMap<CellKey, MatrixCell>,
    pub total_respondents: usize,
    pub last_updated: DateTime<Utc>,
    pub segment_distribution: BTreeMap<MarketSegment, usize>,
}

impl SegmentationMatrix {
    pub fn cell(
        &self,
        segment: MarketSegment,
        criteria: SegmentationCriteria,
    ) -> Option<&MatrixCell> {
        self.cells.get(&(segment, criteria))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentScore {
    pub segment: MarketSegment,
    pub market_size: usize,
    pub pain_point_intensity: f64,
    pub pricing_sensitivity: f64,
    pub accessibility_score: f64,
    pub composite: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeachheadAnalysis {
    pub recommended_segment: MarketSegment,
    pub score: f64,
    pub reasoning: Vec<String>,
    pub market_size: usize,
    pub pain_point_intensity: f64,
    pub pricing_sensitivity: f64,
    pub accessibility_score: f64,
    pub competition_level: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn segment_labels_round_trip_through_from_str() {
        for segment in MarketSegment::ALL {
            assert_eq!(segment.label().parse::<MarketSegment>().unwrap(), segment);
        }
        assert!("Astronauts".parse::<MarketSegment>().is_err());
    }

    #[test]
    fn answers_accept_only_closed_shapes() {
        assert_eq!(
            AnswerValue::try_from(json!("Walking")).unwrap(),
            AnswerValue::Text("Walking".to_string())
        );
        assert_eq!(
            AnswerValue::try_from(json!(["Fresh fruits", "Dairy products"])).unwrap(),
            AnswerValue::MultiSelect(vec![
                "Fresh fruits".to_string(),
                "Dairy products".to_string()
            ])
        );
        assert_eq!(AnswerValue::try_from(json!(4)).unwrap(), AnswerValue::Rating(4));

        assert!(matches!(
            AnswerValue::try_from(json!(9)),
            Err(AnswerError::RatingOutOfRange(9))
        ));
        assert!(AnswerValue::try_from(json!({"a": 1})).is_err());
        assert!(AnswerValue::try_from(json!([1, 2])).is_err());
        assert!(AnswerValue::try_from(json!(null)).is_err());
    }

    #[test]
    fn import_kinds_parse_into_variants() {
        assert_eq!(
            AnswerValue::from_import("multi", "Carrying heavy bags; Long queues").unwrap(),
            AnswerValue::MultiSelect(vec![
                "Carrying heavy bags".to_string(),
                "Long queues".to_string()
            ])
        );
        assert_eq!(
            AnswerValue::from_import("rating", " 3 ").unwrap(),
            AnswerValue::Rating(3)
        );
        assert!(AnswerValue::from_import("rating", "0").is_err());
        assert!(AnswerValue::from_import("slider", "3").is_err());
    }

    #[test]
    fn multi_select_matches_on_any_element() {
        let accepted = vec!["Crowded stores".to_string()];
        let answer = AnswerValue::MultiSelect(vec![
            "Long queues".to_string(),
            "Crowded stores".to_string(),
        ]);
        assert!(answer.matches_any(&accepted));
        assert_eq!(answer.render(), "Long queues, Crowded stores");
        assert!(!AnswerValue::Text("Long queues".to_string()).matches_any(&accepted));
    }

    #[test]
    fn text_answer_skips_blank_and_mismatched_shapes() {
        let mut answers = AnswerSet::new();
        answers.insert("3.1".to_string(), AnswerValue::Text(String::new()));
        answers.insert("5.1".to_string(), AnswerValue::Rating(2));
        answers.insert("3.3".to_string(), AnswerValue::Text("1-2 hours".to_string()));
        let profile = RespondentProfile {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            answers,
            classifications: Vec::new(),
            primary_segment: MarketSegment::Students,
            confidence: 0.0,
        };

        assert_eq!(profile.text_answer("3.1"), None);
        assert_eq!(profile.text_answer("5.1"), None);
        assert_eq!(profile.text_answer("3.3"), Some("1-2 hours"));
        assert!(!profile.has_answer("3.1"));
        assert!(profile.has_answer("5.1"));
    }
}
