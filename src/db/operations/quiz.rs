use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use crate::db::Db;
use crate::services::emotion::EmotionLabel;

/// One graded answer. Append-only: rows are never updated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: String,
    pub subject_id: String,
    pub material_id: String,
    pub question: String,
    pub answer: String,
    pub expected_answer: Option<String>,
    pub emotion: EmotionLabel,
    pub is_correct: bool,
    pub score: i32,
    pub feedback: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttemptInput {
    pub subject_id: String,
    pub material_id: String,
    pub question: String,
    pub answer: String,
    pub expected_answer: Option<String>,
    pub emotion: EmotionLabel,
    pub is_correct: bool,
    pub score: i32,
    pub feedback: String,
}

pub async fn record_attempt(db: &Db, input: QuizAttemptInput) -> Result<QuizAttempt, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO "quiz_attempts" (
            "id", "subjectId", "materialId", "question", "answer",
            "expectedAnswer", "emotion", "isCorrect", "score", "feedback", "createdAt"
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(&id)
    .bind(&input.subject_id)
    .bind(&input.material_id)
    .bind(&input.question)
    .bind(&input.answer)
    .bind(&input.expected_answer)
    .bind(input.emotion.as_str())
    .bind(input.is_correct)
    .bind(input.score)
    .bind(&input.feedback)
    .bind(now)
    .execute(db.pool())
    .await?;

    Ok(QuizAttempt {
        id,
        subject_id: input.subject_id,
        material_id: input.material_id,
        question: input.question,
        answer: input.answer,
        expected_answer: input.expected_answer,
        emotion: input.emotion,
        is_correct: input.is_correct,
        score: input.score,
        feedback: input.feedback,
        created_at: now,
    })
}

/// Most recent attempts first; feeds the remedial performance summary and
/// quiz question de-duplication.
pub async fn recent_attempts(
    db: &Db,
    subject_id: &str,
    material_id: &str,
    limit: i64,
) -> Result<Vec<QuizAttempt>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM "quiz_attempts"
        WHERE "subjectId" = $1 AND "materialId" = $2
        ORDER BY "createdAt" DESC
        LIMIT $3
        "#,
    )
    .bind(subject_id)
    .bind(material_id)
    .bind(limit)
    .fetch_all(db.pool())
    .await?;

    rows.iter().map(map_attempt).collect()
}

fn map_attempt(row: &sqlx::postgres::PgRow) -> Result<QuizAttempt, sqlx::Error> {
    let emotion: String = row.try_get("emotion")?;
    Ok(QuizAttempt {
        id: row.try_get("id")?,
        subject_id: row.try_get("subjectId")?,
        material_id: row.try_get("materialId")?,
        question: row.try_get("question")?,
        answer: row.try_get("answer")?,
        expected_answer: row.try_get("expectedAnswer")?,
        emotion: crate::services::emotion::canonicalize(&emotion),
        is_correct: row.try_get("isCorrect")?,
        score: row.try_get("score")?,
        feedback: row.try_get("feedback")?,
        created_at: row.try_get("createdAt")?,
    })
}
