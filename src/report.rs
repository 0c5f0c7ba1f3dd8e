use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::insights::question_order;
use crate::matrix;
use crate::models::{
    AnswerSet, BeachheadAnalysis, MarketSegment, RespondentProfile, SegmentScore,
    SegmentationCriteria, SegmentationMatrix, StoredRespondent,
};

/// Earliest and latest submission times.
pub fn collection_window(
    population: &[RespondentProfile],
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = population.iter().map(|respondent| respondent.timestamp).min()?;
    let last = population.iter().map(|respondent| respondent.timestamp).max()?;
    Some((first, last))
}

pub fn build_report(
    population: &[RespondentProfile],
    matrix: &SegmentationMatrix,
    analysis: Option<&BeachheadAnalysis>,
    scores: &[SegmentScore],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Market Segmentation Report");
    let _ = writeln!(
        output,
        "Generated {} from {} respondents",
        matrix.last_updated.format("%Y-%m-%d %H:%M UTC"),
        matrix.total_respondents
    );
    if let Some((first, last)) = collection_window(population) {
        let _ = writeln!(
            output,
            "Responses collected {} to {}",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        );
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Segment Distribution");

    if matrix.total_respondents == 0 {
        let _ = writeln!(output, "No survey responses recorded yet.");
    } else {
        for (segment, count) in &matrix.segment_distribution {
            let share = *count as f64 / matrix.total_respondents as f64 * 100.0;
            let _ = writeln!(output, "- {}: {} ({:.1}%)", segment, count, share);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Beachhead Recommendation");

    match analysis {
        None => {
            let _ = writeln!(output, "Not enough data for a recommendation.");
        }
        Some(analysis) => {
            let _ = writeln!(
                output,
                "**{}** (composite score {:.2})",
                analysis.recommended_segment, analysis.score
            );
            for reason in &analysis.reasoning {
                let _ = writeln!(output, "- {reason}");
            }
            let _ = writeln!(
                output,
                "- Accessibility: {:.0}% report easy delivery access",
                analysis.accessibility_score * 100.0
            );

            let _ = writeln!(output);
            let _ = writeln!(output, "| Segment | Size | Pain | Pricing | Access | Score |");
            let _ = writeln!(output, "|---|---|---|---|---|---|");
            for score in scores {
                let _ = writeln!(
                    output,
                    "| {} | {} | {:.2} | {:.2} | {:.2} | {:.2} |",
                    score.segment,
                    score.market_size,
                    score.pain_point_intensity,
                    score.pricing_sensitivity,
                    score.accessibility_score,
                    score.composite
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Segment Insights");

    for segment in MarketSegment::ALL {
        let Some(cell) = matrix.cell(segment, SegmentationCriteria::PainPoints) else {
            continue;
        };
        if cell.respondent_count == 0 {
            continue;
        }

        let _ = writeln!(output);
        let _ = writeln!(output, "### {} ({} respondents)", segment, cell.respondent_count);
        if cell.insights.is_empty() {
            let _ = writeln!(output, "No dominant patterns yet.");
        }
        for insight in &cell.insights {
            let _ = writeln!(output, "- {insight}");
        }
        for criteria in [
            SegmentationCriteria::PainPoints,
            SegmentationCriteria::PricingSensitivity,
            SegmentationCriteria::FrequencyAndAov,
        ] {
            if let Some(cell) = matrix.cell(segment, criteria) {
                for pattern in &cell.key_patterns {
                    let _ = writeln!(output, "- {}: {}", criteria, pattern);
                }
            }
        }
    }

    output
}

fn segment_label(respondent: &StoredRespondent) -> String {
    respondent
        .primary_segment
        .map(|segment| segment.to_string())
        .unwrap_or_else(|| "Not classified".to_string())
}

fn confidence_label(respondent: &StoredRespondent) -> String {
    respondent
        .confidence
        .map(|confidence| format!("{:.1}%", confidence * 100.0))
        .unwrap_or_else(|| "N/A".to_string())
}

/// One line per stored response with its persisted segment.
pub fn format_respondent_list(respondents: &[StoredRespondent]) -> String {
    let mut output = String::new();
    if respondents.is_empty() {
        let _ = writeln!(output, "No survey responses recorded yet.");
        return output;
    }

    let _ = writeln!(output, "{} responses:", respondents.len());
    for respondent in respondents {
        let _ = writeln!(
            output,
            "- {} [{}] {} ({}) submitted {}",
            respondent.id,
            respondent.source_key,
            segment_label(respondent),
            confidence_label(respondent),
            respondent.submitted_at.format("%Y-%m-%d")
        );
    }
    output
}

pub fn format_respondent_detail(respondent: &StoredRespondent, answers: &AnswerSet) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Response {} [{}]", respondent.id, respondent.source_key);
    let _ = writeln!(
        output,
        "Submitted {}",
        respondent.submitted_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(
        output,
        "Primary segment: {} ({} confidence)",
        segment_label(respondent),
        confidence_label(respondent)
    );
    if let Some(classified_at) = respondent.classified_at {
        let _ = writeln!(output, "Classified {}", classified_at.format("%Y-%m-%d %H:%M UTC"));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Answers:");
    if answers.is_empty() {
        let _ = writeln!(output, "No answers recorded.");
    }
    let mut ordered: Vec<_> = answers.iter().collect();
    ordered.sort_by_key(|(question_id, _)| question_order(question_id));
    for (question_id, answer) in ordered {
        let _ = writeln!(output, "- {question_id}: {}", answer.render());
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Classifications:");
    if respondent.classifications.is_empty() {
        let _ = writeln!(output, "Not classified");
    }
    for classification in &respondent.classifications {
        let _ = writeln!(
            output,
            "- {}: {:.1}% ({})",
            classification.segment,
            classification.probability * 100.0,
            classification.reason_factors.join("; ")
        );
    }

    output
}

/// Writes the flattened matrix as CSV.
pub fn write_matrix_csv<W: std::io::Write>(
    matrix: &SegmentationMatrix,
    writer: W,
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in matrix::flatten(matrix) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
