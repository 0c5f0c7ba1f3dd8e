use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::insights::{generate_insights, low_fee_share, whole_percent, LOW_FEE_MARKER};
use crate::models::{
    MarketSegment, MatrixCell, RespondentProfile, SegmentationCriteria, SegmentationMatrix,
};
use crate::rules::questions;

/// Respondents whose primary segment is `segment`.
pub fn cohort(
    population: &[RespondentProfile],
    segment: MarketSegment,
) -> Vec<&RespondentProfile> {
    population
        .iter()
        .filter(|respondent| respondent.primary_segment == segment)
        .collect()
}

pub fn build_matrix(
    population: &[RespondentProfile],
    computed_at: DateTime<Utc>,
) -> SegmentationMatrix {
    let mut segment_distribution: BTreeMap<MarketSegment, usize> =
        MarketSegment::ALL.into_iter().map(|segment| (segment, 0)).collect();
    for respondent in population {
        *segment_distribution
            .entry(respondent.primary_segment)
            .or_default() += 1;
    }

    let mut cells = BTreeMap::new();
    for segment in MarketSegment::ALL {
        let members = cohort(population, segment);
        let insights = generate_insights(&members);
        let average_values = average_values(&members);

        for criteria in SegmentationCriteria::ALL {
            cells.insert(
                (segment, criteria),
                MatrixCell {
                    segment,
                    criteria,
                    respondent_count: members.len(),
                    insights: insights.clone(),
                    key_patterns: key_patterns(criteria, &members),
                    average_values: average_values.clone(),
                },
            );
        }
    }

    tracing::debug!(
        respondents = population.len(),
        cells = cells.len(),
        "built segmentation matrix"
    );

    SegmentationMatrix {
        cells,
        total_respondents: population.len(),
        last_updated: computed_at,
        segment_distribution,
    }
}

fn key_patterns(criteria: SegmentationCriteria, members: &[&RespondentProfile]) -> Vec<String> {
    if members.is_empty() {
        return Vec::new();
    }

    match criteria {
        SegmentationCriteria::PainPoints => {
            let responses = members
                .iter()
                .filter(|respondent| {
                    respondent
                        .text_answer(questions::CHALLENGE_TEXT)
                        .is_some()
                })
                .count();
            if responses > 0 {
                vec![format!("{responses} detailed pain point responses")]
            } else {
                Vec::new()
            }
        }
        SegmentationCriteria::PricingSensitivity => {
            let has_low_fee = members.iter().any(|respondent| {
                respondent
                    .text_answer(questions::DELIVERY_FEE)
                    .is_some_and(|fee| fee.contains(LOW_FEE_MARKER))
            });
            match low_fee_share(members) {
                Some(share) if has_low_fee => {
                    vec![format!("{}% prefer low delivery fees", whole_percent(share))]
                }
                _ => Vec::new(),
            }
        }
        SegmentationCriteria::FrequencyAndAov => {
            let responses = members
                .iter()
                .filter(|respondent| respondent.has_answer(questions::SHOPPING_FREQUENCY))
                .count();
            if responses > 0 {
                vec![format!("Shopping frequency patterns: {responses} responses")]
            } else {
                Vec::new()
            }
        }
        _ => vec![format!("{} respondents in this segment", members.len())],
    }
}

fn average_values(members: &[&RespondentProfile]) -> BTreeMap<String, f64> {
    if members.is_empty() {
        return BTreeMap::new();
    }

    let count = members.len() as f64;
    let confidence = members
        .iter()
        .map(|respondent| respondent.confidence)
        .sum::<f64>()
        / count;
    BTreeMap::from([
        ("confidence".to_string(), confidence),
        ("responseCount".to_string(), count),
    ])
}

/// One exportable row per matrix cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixRow {
    pub segment: String,
    pub criteria: String,
    pub respondent_count: usize,
    pub mean_confidence: Option<f64>,
    pub key_patterns: String,
    pub insights: String,
}

pub fn flatten(matrix: &SegmentationMatrix) -> Vec<MatrixRow> {
    matrix
        .cells
        .values()
        .map(|cell| MatrixRow {
            segment: cell.segment.to_string(),
            criteria: cell.criteria.to_string(),
            respondent_count: cell.respondent_count,
            mean_confidence: cell.average_values.get("confidence").copied(),
            key_patterns: cell.key_patterns.join("; "),
            insights: cell.insights.join("; "),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::models::{AnswerSet, AnswerValue, SurveyResponse};
    use uuid::Uuid;

    fn respondent(
        segment: MarketSegment,
        confidence: f64,
        pairs: &[(&str, &str)],
    ) -> RespondentProfile {
        let answers: AnswerSet = pairs
            .iter()
            .map(|(id, value)| (id.to_string(), AnswerValue::Text(value.to_string())))
            .collect();
        RespondentProfile {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            answers,
            classifications: Vec::new(),
            primary_segment: segment,
            confidence,
        }
    }

    fn population() -> Vec<RespondentProfile> {
        vec![
            respondent(
                MarketSegment::Students,
                0.8,
                &[("3.1", "Long queues"), ("5.1", "150 DZD or less"), ("6.1", "1-2 times")],
            ),
            respondent(
                MarketSegment::Students,
                0.6,
                &[("3.1", ""), ("5.1", "200-300 DZD")],
            ),
            respondent(MarketSegment::Elders, 1.0, &[("3.1", "Heavy bags")]),
        ]
    }

    #[test]
    fn matrix_has_every_cell_and_balanced_distribution() {
        let people = population();
        let matrix = build_matrix(&people, Utc::now());

        assert_eq!(matrix.cells.len(), 56);
        assert_eq!(matrix.total_respondents, 3);
        assert_eq!(matrix.segment_distribution.len(), 7);
        assert_eq!(matrix.segment_distribution.values().sum::<usize>(), 3);
        assert_eq!(matrix.segment_distribution[&MarketSegment::Students], 2);
        assert_eq!(matrix.segment_distribution[&MarketSegment::SingleParents], 0);
    }

    #[test]
    fn empty_population_still_fills_the_grid() {
        let matrix = build_matrix(&[], Utc::now());

        assert_eq!(matrix.cells.len(), 56);
        assert_eq!(matrix.segment_distribution.values().sum::<usize>(), 0);
        assert!(matrix.cells.values().all(|cell| cell.respondent_count == 0
            && cell.insights.is_empty()
            && cell.key_patterns.is_empty()
            && cell.average_values.is_empty()));
    }

    #[test]
    fn key_patterns_depend_on_criteria() {
        let people = population();
        let matrix = build_matrix(&people, Utc::now());
        let students = |criteria| matrix.cell(MarketSegment::Students, criteria).unwrap();

        assert_eq!(
            students(SegmentationCriteria::PainPoints).key_patterns,
            vec!["1 detailed pain point responses"]
        );
        assert_eq!(
            students(SegmentationCriteria::PricingSensitivity).key_patterns,
            vec!["50% prefer low delivery fees"]
        );
        assert_eq!(
            students(SegmentationCriteria::FrequencyAndAov).key_patterns,
            vec!["Shopping frequency patterns: 1 responses"]
        );
        assert_eq!(
            students(SegmentationCriteria::Competition).key_patterns,
            vec!["2 respondents in this segment"]
        );
    }

    #[test]
    fn insights_and_averages_repeat_across_criteria() {
        let people = population();
        let matrix = build_matrix(&people, Utc::now());
        let first = matrix
            .cell(MarketSegment::Students, SegmentationCriteria::JobsToBeDone)
            .unwrap();

        for criteria in SegmentationCriteria::ALL {
            let cell = matrix.cell(MarketSegment::Students, criteria).unwrap();
            assert_eq!(cell.insights, first.insights);
            assert_eq!(cell.average_values, first.average_values);
        }
        assert!((first.average_values["confidence"] - 0.7).abs() < 1e-9);
        assert_eq!(first.average_values["responseCount"], 2.0);
    }

    #[test]
    fn flatten_emits_one_row_per_cell() {
        let people = population();
        let rows = flatten(&build_matrix(&people, Utc::now()));

        assert_eq!(rows.len(), 56);
        let elders_pain = rows
            .iter()
            .find(|row| row.segment == "Elders" && row.criteria == "Pain Points")
            .unwrap();
        assert_eq!(elders_pain.respondent_count, 1);
        assert_eq!(elders_pain.mean_confidence, Some(1.0));
        assert!(elders_pain.insights.contains("Common pain point: heavy (1 mentions)"));
    }

    #[test]
    fn pricing_pattern_needs_a_lowest_tier_fee() {
        let people = vec![
            respondent(MarketSegment::Students, 0.5, &[("5.1", "200-300 DZD")]),
            respondent(MarketSegment::Students, 0.5, &[("5.1", "400+ DZD is fine")]),
        ];
        let matrix = build_matrix(&people, Utc::now());
        let pricing = matrix
            .cell(MarketSegment::Students, SegmentationCriteria::PricingSensitivity)
            .unwrap();

        assert_eq!(pricing.respondent_count, 2);
        assert!(pricing.key_patterns.is_empty());
    }

    #[test]
    fn classified_population_feeds_the_matrix() {
        let text = |value: &str| AnswerValue::Text(value.to_string());
        let elder: AnswerSet = [
            ("1.2", text("Above 60")),
            ("1.4", text("Retired")),
            ("1.5", text("Walking")),
            ("3.3", text("2+ hours - very frustrating")),
            ("10.1", text("Family members")),
        ]
        .into_iter()
        .map(|(id, value)| (id.to_string(), value))
        .collect();
        let responses = vec![
            SurveyResponse {
                id: Uuid::new_v4(),
                submitted_at: Utc::now(),
                answers: elder,
            },
            SurveyResponse {
                id: Uuid::new_v4(),
                submitted_at: Utc::now(),
                answers: AnswerSet::new(),
            },
        ];

        let profiles = Classifier::default().profile_all(responses);
        let matrix = build_matrix(&profiles, Utc::now());

        assert_eq!(profiles[1].primary_segment, MarketSegment::UrbanProfessionals);
        assert_eq!(matrix.cells.len(), 56);
        assert_eq!(matrix.total_respondents, 2);
        assert_eq!(matrix.segment_distribution.values().sum::<usize>(), 2);
        assert_eq!(matrix.segment_distribution[&MarketSegment::Elders], 1);
        assert_eq!(matrix.segment_distribution[&MarketSegment::UrbanProfessionals], 1);
        let fallback = matrix
            .cell(MarketSegment::UrbanProfessionals, SegmentationCriteria::JobsToBeDone)
            .unwrap();
        assert_eq!(fallback.average_values["confidence"], 0.0);
    }
}
