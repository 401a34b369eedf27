use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use crate::db::Db;
use crate::services::emotion::{canonicalize, EmotionLabel};

/// Append-only emotion observation. The canonical label is derived from the
/// raw one at insert time and stored alongside it for windowed queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionEvent {
    pub id: String,
    pub subject_id: String,
    pub material_id: Option<String>,
    pub raw_label: String,
    pub canonical: EmotionLabel,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionEventInput {
    pub subject_id: String,
    pub material_id: Option<String>,
    pub raw_label: String,
    pub confidence: f64,
}

pub async fn record_emotion(db: &Db, input: EmotionEventInput) -> Result<EmotionEvent, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let canonical = canonicalize(&input.raw_label);
    let confidence = if input.confidence.is_finite() {
        input.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };

    sqlx::query(
        r#"
        INSERT INTO "emotion_events" (
            "id", "subjectId", "materialId", "rawLabel", "canonical", "confidence", "createdAt"
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(&id)
    .bind(&input.subject_id)
    .bind(&input.material_id)
    .bind(&input.raw_label)
    .bind(canonical.as_str())
    .bind(confidence)
    .bind(now)
    .execute(db.pool())
    .await?;

    Ok(EmotionEvent {
        id,
        subject_id: input.subject_id,
        material_id: input.material_id,
        raw_label: input.raw_label,
        canonical,
        confidence,
        created_at: now,
    })
}

/// Most recent event for a subject+material at or after `since`. Used by the
/// remedial composer's trailing-window emotion lookup.
pub async fn latest_emotion_since(
    db: &Db,
    subject_id: &str,
    material_id: &str,
    since: DateTime<Utc>,
) -> Result<Option<EmotionEvent>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT * FROM "emotion_events"
        WHERE "subjectId" = $1 AND "materialId" = $2 AND "createdAt" >= $3
        ORDER BY "createdAt" DESC
        LIMIT 1
        "#,
    )
    .bind(subject_id)
    .bind(material_id)
    .bind(since)
    .fetch_optional(db.pool())
    .await?;

    row.map(|r| map_event(&r)).transpose()
}

/// Canonical labels most recent first, sized for the anxiety detector's
/// rolling window.
pub async fn recent_labels(
    db: &Db,
    subject_id: &str,
    material_id: Option<&str>,
    limit: i64,
) -> Result<Vec<EmotionLabel>, sqlx::Error> {
    let rows = match material_id {
        Some(material_id) => {
            sqlx::query(
                r#"
                SELECT "canonical" FROM "emotion_events"
                WHERE "subjectId" = $1 AND "materialId" = $2
                ORDER BY "createdAt" DESC
                LIMIT $3
                "#,
            )
            .bind(subject_id)
            .bind(material_id)
            .bind(limit)
            .fetch_all(db.pool())
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT "canonical" FROM "emotion_events"
                WHERE "subjectId" = $1
                ORDER BY "createdAt" DESC
                LIMIT $2
                "#,
            )
            .bind(subject_id)
            .bind(limit)
            .fetch_all(db.pool())
            .await?
        }
    };

    rows.iter()
        .map(|row| {
            let label: String = row.try_get("canonical")?;
            Ok(canonicalize(&label))
        })
        .collect()
}

fn map_event(row: &sqlx::postgres::PgRow) -> Result<EmotionEvent, sqlx::Error> {
    let canonical: String = row.try_get("canonical")?;
    Ok(EmotionEvent {
        id: row.try_get("id")?,
        subject_id: row.try_get("subjectId")?,
        material_id: row.try_get("materialId")?,
        raw_label: row.try_get("rawLabel")?,
        canonical: canonicalize(&canonical),
        confidence: row.try_get("confidence")?,
        created_at: row.try_get("createdAt")?,
    })
}
