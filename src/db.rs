use std::collections::BTreeMap;

use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::types::Json;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    AnswerSet, AnswerValue, MarketSegment, RespondentProfile, SegmentClassification,
    StoredRespondent, SurveyResponse,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Inserts a response and its answers. Returns false when `source_key`
/// was already imported.
async fn insert_response(
    pool: &PgPool,
    source_key: &str,
    submitted_at: DateTime<Utc>,
    answers: &AnswerSet,
) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO survey_segmentation.responses (id, source_key, submitted_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (source_key) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(source_key)
    .bind(submitted_at)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = inserted else {
        tx.rollback().await?;
        return Ok(false);
    };
    let response_id: Uuid = row.get("id");

    for (question_id, answer) in answers {
        sqlx::query(
            r#"
            INSERT INTO survey_segmentation.answers (response_id, question_id, answer_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (response_id, question_id) DO UPDATE
            SET answer_value = EXCLUDED.answer_value
            "#,
        )
        .bind(response_id)
        .bind(question_id)
        .bind(Json(answer))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(true)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let text = |value: &str| AnswerValue::Text(value.to_string());
    let many = |values: &[&str]| {
        AnswerValue::MultiSelect(values.iter().map(|value| value.to_string()).collect())
    };

    let responses = vec![
        (
            "seed-001",
            Utc.with_ymd_and_hms(2026, 2, 2, 9, 30, 0)
                .single()
                .context("invalid timestamp")?,
            vec![
                ("1.2", text("Above 60")),
                ("1.3", text("Small family (3-4 people)")),
                ("1.4", text("Retired")),
                ("1.5", text("Walking")),
                ("3.1", text("Carrying heavy bags up the hill and long queues")),
                ("3.2", AnswerValue::Rating(2)),
                ("3.3", text("1-2 hours - somewhat bothersome")),
                ("3.4", many(&["Carrying heavy bags", "Long queues"])),
                ("5.1", text("150 DZD or less")),
                ("6.1", text("1-2 times")),
                ("10.1", text("Family members")),
            ],
        ),
        (
            "seed-002",
            Utc.with_ymd_and_hms(2026, 2, 3, 18, 5, 0)
                .single()
                .context("invalid timestamp")?,
            vec![
                ("1.2", text("Under 25")),
                ("1.3", text("With roommates")),
                ("1.4", text("Student")),
                ("1.5", text("By bus/public transport")),
                ("1.6", text("Usually cheapest options")),
                ("3.1", text("Not enough time between classes")),
                ("3.2", AnswerValue::Rating(3)),
                ("3.3", text("30-60 minutes - manageable")),
                ("5.1", text("150 DZD or less")),
                ("6.1", text("3-4 times")),
                ("6.2", text("Under 2,000 DZD")),
            ],
        ),
        (
            "seed-003",
            Utc.with_ymd_and_hms(2026, 2, 4, 12, 45, 0)
                .single()
                .context("invalid timestamp")?,
            vec![
                ("1.2", text("25–40")),
                ("1.3", text("Live alone (1 person)")),
                ("1.4", text("Working full-time")),
                ("1.5", text("By car")),
                ("1.6", text("Premium/high-quality products")),
                ("3.1", text("Parking is a nightmare and stores are crowded")),
                ("3.2", AnswerValue::Rating(2)),
                ("3.3", text("2+ hours - very frustrating")),
                ("3.4", many(&["Limited parking", "Crowded stores"])),
                ("5.1", text("400+ DZD is fine")),
                ("6.2", text("8,000-15,000 DZD")),
            ],
        ),
    ];

    let mut inserted = 0usize;
    for (source_key, submitted_at, answers) in responses {
        let answers: AnswerSet = answers
            .into_iter()
            .map(|(question_id, answer)| (question_id.to_string(), answer))
            .collect();
        if insert_response(pool, source_key, submitted_at, &answers).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

/// Loads every response with its answers, oldest first.
pub async fn fetch_responses(pool: &PgPool) -> anyhow::Result<Vec<SurveyResponse>> {
    let response_rows = sqlx::query(
        "SELECT id, submitted_at FROM survey_segmentation.responses ORDER BY submitted_at, id",
    )
    .fetch_all(pool)
    .await?;

    let answer_rows = sqlx::query(
        "SELECT response_id, question_id, answer_value FROM survey_segmentation.answers",
    )
    .fetch_all(pool)
    .await?;

    let mut grouped: BTreeMap<Uuid, AnswerSet> = BTreeMap::new();
    for row in answer_rows {
        let response_id: Uuid = row.get("response_id");
        let question_id: String = row.get("question_id");
        let Json(raw): Json<serde_json::Value> = row.get("answer_value");
        let answer = AnswerValue::try_from(raw).with_context(|| {
            format!("response {response_id} has a malformed answer to {question_id}")
        })?;
        grouped
            .entry(response_id)
            .or_default()
            .insert(question_id, answer);
    }

    let responses = response_rows
        .into_iter()
        .map(|row| {
            let id: Uuid = row.get("id");
            SurveyResponse {
                id,
                submitted_at: row.get("submitted_at"),
                answers: grouped.remove(&id).unwrap_or_default(),
            }
        })
        .collect();

    Ok(responses)
}

/// Persists each profile's classification for downstream dashboards.
pub async fn store_profiles(pool: &PgPool, profiles: &[RespondentProfile]) -> anyhow::Result<u64> {
    let mut updated = 0u64;
    for profile in profiles {
        let result = sqlx::query(
            r#"
            UPDATE survey_segmentation.responses
            SET primary_segment = $2,
                confidence_score = $3,
                classified_segments = $4,
                classified_at = now()
            WHERE id = $1
            "#,
        )
        .bind(profile.id)
        .bind(profile.primary_segment.label())
        .bind(profile.confidence)
        .bind(Json(&profile.classifications))
        .execute(pool)
        .await?;
        updated += result.rows_affected();
    }
    Ok(updated)
}

const STORED_COLUMNS: &str = "id, source_key, submitted_at, primary_segment, confidence_score, \
     classified_segments, classified_at";

fn stored_respondent(row: &PgRow) -> anyhow::Result<StoredRespondent> {
    let id: Uuid = row.get("id");
    let primary_segment = row
        .get::<Option<String>, _>("primary_segment")
        .map(|label| label.parse::<MarketSegment>())
        .transpose()
        .with_context(|| format!("response {id} has an unknown stored segment"))?;
    let classifications = row
        .get::<Option<Json<Vec<SegmentClassification>>>, _>("classified_segments")
        .map(|Json(classifications)| classifications)
        .unwrap_or_default();

    Ok(StoredRespondent {
        id,
        source_key: row.get("source_key"),
        submitted_at: row.get("submitted_at"),
        primary_segment,
        confidence: row.get("confidence_score"),
        classifications,
        classified_at: row.get("classified_at"),
    })
}

/// Every stored response with its persisted classification, newest first.
pub async fn fetch_stored_respondents(pool: &PgPool) -> anyhow::Result<Vec<StoredRespondent>> {
    let rows = sqlx::query(&format!(
        "SELECT {STORED_COLUMNS} FROM survey_segmentation.responses \
         ORDER BY submitted_at DESC, id"
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(stored_respondent).collect()
}

/// Looks a response up by id, or by import key when `key` is not a uuid.
pub async fn find_respondent(
    pool: &PgPool,
    key: &str,
) -> anyhow::Result<Option<(StoredRespondent, AnswerSet)>> {
    let row = match Uuid::parse_str(key.trim()) {
        Ok(id) => {
            sqlx::query(&format!(
                "SELECT {STORED_COLUMNS} FROM survey_segmentation.responses WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(pool)
            .await?
        }
        Err(_) => {
            sqlx::query(&format!(
                "SELECT {STORED_COLUMNS} FROM survey_segmentation.responses WHERE source_key = $1"
            ))
            .bind(key.trim())
            .fetch_optional(pool)
            .await?
        }
    };
    let Some(row) = row else {
        return Ok(None);
    };
    let respondent = stored_respondent(&row)?;

    let answer_rows = sqlx::query(
        "SELECT question_id, answer_value FROM survey_segmentation.answers WHERE response_id = $1",
    )
    .bind(respondent.id)
    .fetch_all(pool)
    .await?;

    let mut answers = AnswerSet::new();
    for row in answer_rows {
        let question_id: String = row.get("question_id");
        let Json(raw): Json<serde_json::Value> = row.get("answer_value");
        let answer = AnswerValue::try_from(raw).with_context(|| {
            format!("response {} has a malformed answer to {question_id}", respondent.id)
        })?;
        answers.insert(question_id, answer);
    }

    Ok(Some((respondent, answers)))
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        response_key: String,
        submitted_at: DateTime<Utc>,
        question_id: String,
        kind: String,
        answer: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut responses: BTreeMap<String, (DateTime<Utc>, AnswerSet)> = BTreeMap::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let answer = AnswerValue::from_import(&row.kind, &row.answer)
            .with_context(|| format!("row {} ({})", index + 2, row.question_id))?;
        responses
            .entry(row.response_key)
            .or_insert_with(|| (row.submitted_at, AnswerSet::new()))
            .1
            .insert(row.question_id, answer);
    }

    let mut inserted = 0usize;
    for (response_key, (submitted_at, answers)) in &responses {
        if insert_response(pool, response_key, *submitted_at, answers).await? {
            inserted += 1;
        } else {
            tracing::debug!(response_key = %response_key, "response already imported");
        }
    }

    Ok(inserted)
}
