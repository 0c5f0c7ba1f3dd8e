use std::collections::BTreeMap;

use crate::models::RespondentProfile;
use crate::rules::questions;

/// Share of a cohort that must give the same answer for it to be dominant.
pub const DOMINANT_SHARE: f64 = 0.60;
/// Share of challenge texts that must mention a keyword.
pub const PAIN_POINT_SHARE: f64 = 0.30;
/// Share of fee answers in the lowest tier before the cohort is price sensitive.
pub const LOW_FEE_SHARE: f64 = 0.50;

pub const PAIN_KEYWORDS: [&str; 7] = [
    "time",
    "transport",
    "heavy",
    "queue",
    "parking",
    "crowded",
    "expensive",
];

/// Substring identifying the lowest delivery fee tier ("150 DZD or less").
pub const LOW_FEE_MARKER: &str = "150";

/// Insight strings for a cohort already restricted to one segment.
pub fn generate_insights(cohort: &[&RespondentProfile]) -> Vec<String> {
    if cohort.is_empty() {
        return Vec::new();
    }

    let mut insights = dominant_answers(cohort);
    insights.extend(pain_points(cohort));
    insights.extend(pricing(cohort));
    insights
}

fn dominant_answers(cohort: &[&RespondentProfile]) -> Vec<String> {
    let mut frequency: BTreeMap<&str, BTreeMap<String, usize>> = BTreeMap::new();

    for respondent in cohort {
        for (question_id, answer) in &respondent.answers {
            *frequency
                .entry(question_id.as_str())
                .or_default()
                .entry(answer.render())
                .or_default() += 1;
        }
    }

    let mut ordered: Vec<_> = frequency.into_iter().collect();
    ordered.sort_by_key(|(question_id, _)| question_order(question_id));

    let mut insights = Vec::new();
    for (_, answers) in ordered {
        for (answer, count) in answers {
            let share = count as f64 / cohort.len() as f64;
            if share >= DOMINANT_SHARE {
                insights.push(format!("{}% prefer: {}", whole_percent(share), answer));
            }
        }
    }
    insights
}

fn pain_points(cohort: &[&RespondentProfile]) -> Vec<String> {
    let texts: Vec<String> = cohort
        .iter()
        .filter_map(|respondent| respondent.text_answer(questions::CHALLENGE_TEXT))
        .map(str::to_lowercase)
        .collect();

    if texts.is_empty() {
        return Vec::new();
    }

    PAIN_KEYWORDS
        .iter()
        .filter_map(|keyword| {
            let mentions = texts.iter().filter(|text| text.contains(keyword)).count();
            (mentions as f64 > texts.len() as f64 * PAIN_POINT_SHARE)
                .then(|| format!("Common pain point: {keyword} ({mentions} mentions)"))
        })
        .collect()
}

fn pricing(cohort: &[&RespondentProfile]) -> Vec<String> {
    match low_fee_share(cohort) {
        Some(share) if share > LOW_FEE_SHARE => vec![format!(
            "Price sensitive: {}% prefer low delivery fees",
            whole_percent(share)
        )],
        _ => Vec::new(),
    }
}

/// Fraction of delivery fee answers in the lowest tier; `None` without answers.
pub fn low_fee_share(cohort: &[&RespondentProfile]) -> Option<f64> {
    let fees: Vec<&str> = cohort
        .iter()
        .filter_map(|respondent| respondent.text_answer(questions::DELIVERY_FEE))
        .collect();

    if fees.is_empty() {
        return None;
    }

    let low = fees.iter().filter(|fee| fee.contains(LOW_FEE_MARKER)).count();
    Some(low as f64 / fees.len() as f64)
}

/// `share` in [0, 1] as a whole percentage, half rounded away from zero.
pub fn whole_percent(share: f64) -> i64 {
    (share * 100.0).round() as i64
}

/// Orders dotted ids numerically so "10.1" follows "9.4".
pub fn question_order(question_id: &str) -> (u32, u32, String) {
    let mut parts = question_id.splitn(2, '.');
    let step = parts.next().and_then(|part| part.parse().ok()).unwrap_or(u32::MAX);
    let question = parts.next().and_then(|part| part.parse().ok()).unwrap_or(u32::MAX);
    (step, question, question_id.to_string())
}
