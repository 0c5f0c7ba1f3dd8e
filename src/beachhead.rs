use crate::matrix::cohort;
use crate::models::{BeachheadAnalysis, MarketSegment, RespondentProfile, SegmentScore};
use crate::rules::questions;

pub const MARKET_SIZE_WEIGHT: f64 = 0.3;
pub const PAIN_WEIGHT: f64 = 0.3;
pub const PRICING_WEIGHT: f64 = 0.2;
pub const ACCESSIBILITY_WEIGHT: f64 = 0.2;

/// No competition data is collected yet.
pub const COMPETITION_PLACEHOLDER: f64 = 0.5;

const FRUSTRATION_MARKERS: [&str; 2] = ["very frustrating", "somewhat bothersome"];
const MODERATE_FEE_MARKERS: [&str; 2] = ["150-250", "250-400"];
const EASY_ACCESS_MARKERS: [&str; 2] = ["Very easy", "Generally accessible"];

/// Share of answers to `question_id` containing any marker; 0 without answers.
fn marker_share(members: &[&RespondentProfile], question_id: &str, markers: &[&str]) -> f64 {
    let answers: Vec<&str> = members
        .iter()
        .filter_map(|respondent| respondent.text_answer(question_id))
        .collect();

    if answers.is_empty() {
        return 0.0;
    }

    let hits = answers
        .iter()
        .filter(|answer| markers.iter().any(|marker| answer.contains(marker)))
        .count();
    hits as f64 / answers.len() as f64
}

pub fn pain_point_intensity(members: &[&RespondentProfile]) -> f64 {
    marker_share(members, questions::TIME_SPENT, &FRUSTRATION_MARKERS)
}

pub fn pricing_sensitivity(members: &[&RespondentProfile]) -> f64 {
    marker_share(members, questions::DELIVERY_FEE, &MODERATE_FEE_MARKERS)
}

pub fn accessibility_score(members: &[&RespondentProfile]) -> f64 {
    marker_share(members, questions::DELIVERY_ACCESS, &EASY_ACCESS_MARKERS)
}

/// Composite scores for every segment in declaration order.
///
/// Market size is a raw respondent count while the other terms are
/// fractions, so large cohorts dominate the composite.
pub fn score_segments(population: &[RespondentProfile]) -> Vec<SegmentScore> {
    MarketSegment::ALL
        .into_iter()
        .map(|segment| {
            let members = cohort(population, segment);
            let market_size = members.len();
            let pain_point_intensity = pain_point_intensity(&members);
            let pricing_sensitivity = pricing_sensitivity(&members);
            let accessibility_score = accessibility_score(&members);
            let composite = market_size as f64 * MARKET_SIZE_WEIGHT
                + pain_point_intensity * PAIN_WEIGHT
                + pricing_sensitivity * PRICING_WEIGHT
                + accessibility_score * ACCESSIBILITY_WEIGHT;

            SegmentScore {
                segment,
                market_size,
                pain_point_intensity,
                pricing_sensitivity,
                accessibility_score,
                composite,
            }
        })
        .collect()
}

/// Highest composite wins; the first declared segment wins ties.
/// Returns `None` for an empty population.
pub fn recommend(population: &[RespondentProfile]) -> Option<BeachheadAnalysis> {
    if population.is_empty() {
        return None;
    }

    let scores = score_segments(population);
    let best = scores.iter().fold(None::<&SegmentScore>, |best, score| match best {
        Some(current) if current.composite >= score.composite => Some(current),
        _ => Some(score),
    })?;

    tracing::info!(
        segment = %best.segment,
        score = best.composite,
        respondents = population.len(),
        "selected beachhead segment"
    );

    Some(BeachheadAnalysis {
        recommended_segment: best.segment,
        score: best.composite,
        reasoning: reasoning(best, population.len()),
        market_size: best.market_size,
        pain_point_intensity: best.pain_point_intensity,
        pricing_sensitivity: best.pricing_sensitivity,
        accessibility_score: best.accessibility_score,
        competition_level: COMPETITION_PLACEHOLDER,
    })
}

fn reasoning(best: &SegmentScore, total: usize) -> Vec<String> {
    let share = best.market_size as f64 / total as f64 * 100.0;
    vec![
        format!("Market size: {} respondents ({:.1}%)", best.market_size, share),
        format!(
            "Pain point intensity: {}% express frustration with current shopping",
            (best.pain_point_intensity * 100.0).round() as i64
        ),
        format!(
            "Pricing alignment: {}% accept moderate delivery fees",
            (best.pricing_sensitivity * 100.0).round() as i64
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerSet, AnswerValue};
    use chrono::Utc;
    use uuid::Uuid;

    fn respondent(segment: MarketSegment, pairs: &[(&str, &str)]) -> RespondentProfile {
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
            confidence: 0.5,
        }
    }

    fn ten_with_seven_students() -> Vec<RespondentProfile> {
        let mut people: Vec<RespondentProfile> = (0..7)
            .map(|_| {
                respondent(
                    MarketSegment::Students,
                    &[
                        ("5.1", "Under 2,000 DZD"),
                        ("3.3", "1-2 hours - somewhat bothersome"),
                    ],
                )
            })
            .collect();
        people.extend((0..3).map(|_| {
            respondent(
                MarketSegment::Elders,
                &[("5.1", "150-250 DZD"), ("9.2", "Very easy access")],
            )
        }));
        people
    }

    #[test]
    fn empty_population_has_no_recommendation() {
        assert_eq!(recommend(&[]), None);
    }

    #[test]
    fn students_without_moderate_fees_have_zero_pricing_sensitivity() {
        let people = ten_with_seven_students();
        let analysis = recommend(&people).unwrap();

        assert_eq!(analysis.recommended_segment, MarketSegment::Students);
        assert_eq!(analysis.market_size, 7);
        assert_eq!(analysis.pricing_sensitivity, 0.0);
        assert_eq!(analysis.pain_point_intensity, 1.0);
        assert_eq!(analysis.competition_level, COMPETITION_PLACEHOLDER);
        assert_eq!(
            analysis.reasoning,
            vec![
                "Market size: 7 respondents (70.0%)",
                "Pain point intensity: 100% express frustration with current shopping",
                "Pricing alignment: 0% accept moderate delivery fees",
            ]
        );
    }

    #[test]
    fn recommended_score_dominates_all_segments() {
        let people = ten_with_seven_students();
        let analysis = recommend(&people).unwrap();

        for score in score_segments(&people) {
            assert!(analysis.score >= score.composite);
        }
    }

    #[test]
    fn composite_uses_raw_market_size() {
        let people = ten_with_seven_students();
        let elders = score_segments(&people)
            .into_iter()
            .find(|score| score.segment == MarketSegment::Elders)
            .unwrap();

        // Three respondents contribute 0.9 on their own, more than all fractions combined.
        let expected = 3.0 * 0.3 + 0.0 * 0.3 + 1.0 * 0.2 + 1.0 * 0.2;
        assert!((elders.composite - expected).abs() < 1e-9);
    }

    #[test]
    fn ties_go_to_first_declared_segment() {
        let people = vec![
            respondent(MarketSegment::SingleParents, &[]),
            respondent(MarketSegment::Elders, &[]),
        ];
        let analysis = recommend(&people).unwrap();
        assert_eq!(analysis.recommended_segment, MarketSegment::Elders);
    }

    #[test]
    fn missing_answers_score_zero() {
        let people = vec![respondent(MarketSegment::Students, &[("3.1", "queues")])];
        let members: Vec<&RespondentProfile> = people.iter().collect();

        assert_eq!(pain_point_intensity(&members), 0.0);
        assert_eq!(pricing_sensitivity(&members), 0.0);
        assert_eq!(accessibility_score(&members), 0.0);
    }
}
