use std::cmp::Ordering;

use crate::models::{
    AnswerSet, AnswerValue, MarketSegment, RespondentProfile, SegmentClassification,
    SurveyResponse,
};
use crate::rules::{question_for_factor, questions, RuleTable, SegmentRule};

/// Classifications at or below this probability are dropped.
pub const INCLUSION_THRESHOLD: f64 = 0.10;

/// Scores answer sets against a fixed rule table.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: RuleTable,
    fallback: MarketSegment,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(RuleTable::standard(), MarketSegment::UrbanProfessionals)
    }
}

impl Classifier {
    pub fn new(rules: RuleTable, fallback: MarketSegment) -> Self {
        Self { rules, fallback }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Ranked classifications above the inclusion threshold. Equal
    /// probabilities keep rule table order.
    pub fn classify(&self, answers: &AnswerSet) -> Vec<SegmentClassification> {
        let mut classifications: Vec<SegmentClassification> = self
            .rules
            .segments
            .iter()
            .map(|rule| score_segment(rule, answers))
            .filter(|classification| classification.probability > INCLUSION_THRESHOLD)
            .collect();

        classifications.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(Ordering::Equal)
        });
        classifications
    }

    pub fn profile(&self, response: SurveyResponse) -> RespondentProfile {
        let classifications = self.classify(&response.answers);
        let (primary_segment, confidence) = match classifications.first() {
            Some(top) => (top.segment, top.probability),
            None => (self.fallback, 0.0),
        };

        let mismatched = mismatched_text_answers(&response.answers);
        if !mismatched.is_empty() {
            tracing::warn!(
                respondent = %response.id,
                questions = ?mismatched,
                "expected text answers, these will be ignored"
            );
        }

        tracing::debug!(
            respondent = %response.id,
            primary = %primary_segment,
            confidence,
            candidates = classifications.len(),
            "classified respondent"
        );

        RespondentProfile {
            id: response.id,
            timestamp: response.submitted_at,
            answers: response.answers,
            classifications,
            primary_segment,
            confidence,
        }
    }

    pub fn profile_all(&self, responses: Vec<SurveyResponse>) -> Vec<RespondentProfile> {
        responses
            .into_iter()
            .map(|response| self.profile(response))
            .collect()
    }
}

/// Free-text questions holding a list or rating instead.
fn mismatched_text_answers(answers: &AnswerSet) -> Vec<&'static str> {
    questions::FREE_TEXT
        .into_iter()
        .filter(|id| {
            answers
                .get(*id)
                .is_some_and(|answer| !matches!(answer, AnswerValue::Text(_)))
        })
        .collect()
}

fn score_segment(rule: &SegmentRule, answers: &AnswerSet) -> SegmentClassification {
    let mut matched = 0usize;
    let mut reason_factors = Vec::new();

    for factor in &rule.factors {
        let Some(answer) = question_for_factor(&factor.factor).and_then(|id| answers.get(id))
        else {
            continue;
        };

        if answer.matches_any(&factor.accepted) {
            matched += 1;
            reason_factors.push(format!("{}: {}", factor.factor, answer.render()));
        }
    }

    let total = rule.factors.len();
    let probability = if total == 0 {
        0.0
    } else {
        (matched as f64 / total as f64) * rule.weight
    };

    SegmentClassification {
        segment: rule.segment,
        probability,
        reason_factors,
    }
}
