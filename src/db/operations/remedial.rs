use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::db::Db;
use crate::services::emotion::{canonicalize, EmotionLabel};

/// One remedial document per (subject, material). Regeneration overwrites;
/// there is no version history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemedialDocument {
    pub subject_id: String,
    pub material_id: String,
    pub content: String,
    pub emotion: EmotionLabel,
    pub material_version: String,
    pub average_score: f64,
    pub wrong_count: i32,
    pub last_attempt: Option<String>,
    pub updated_at: DateTime<Utc>,
}

pub async fn upsert_remedial(db: &Db, doc: &RemedialDocument) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "remedial_documents" (
            "subjectId", "materialId", "content", "emotion", "materialVersion",
            "averageScore", "wrongCount", "lastAttempt", "updatedAt"
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT ("subjectId", "materialId") DO UPDATE SET
            "content" = EXCLUDED."content",
            "emotion" = EXCLUDED."emotion",
            "materialVersion" = EXCLUDED."materialVersion",
            "averageScore" = EXCLUDED."averageScore",
            "wrongCount" = EXCLUDED."wrongCount",
            "lastAttempt" = EXCLUDED."lastAttempt",
            "updatedAt" = EXCLUDED."updatedAt"
        "#,
    )
    .bind(&doc.subject_id)
    .bind(&doc.material_id)
    .bind(&doc.content)
    .bind(doc.emotion.as_str())
    .bind(&doc.material_version)
    .bind(doc.average_score)
    .bind(doc.wrong_count)
    .bind(&doc.last_attempt)
    .bind(doc.updated_at)
    .execute(db.pool())
    .await?;

    Ok(())
}

pub async fn get_remedial(
    db: &Db,
    subject_id: &str,
    material_id: &str,
) -> Result<Option<RemedialDocument>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT * FROM "remedial_documents"
        WHERE "subjectId" = $1 AND "materialId" = $2
        LIMIT 1
        "#,
    )
    .bind(subject_id)
    .bind(material_id)
    .fetch_optional(db.pool())
    .await?;

    row.map(|r| map_remedial(&r)).transpose()
}

fn map_remedial(row: &sqlx::postgres::PgRow) -> Result<RemedialDocument, sqlx::Error> {
    let emotion: String = row.try_get("emotion")?;
    Ok(RemedialDocument {
        subject_id: row.try_get("subjectId")?,
        material_id: row.try_get("materialId")?,
        content: row.try_get("content")?,
        emotion: canonicalize(&emotion),
        material_version: row.try_get("materialVersion")?,
        average_score: row.try_get("averageScore")?,
        wrong_count: row.try_get("wrongCount")?,
        last_attempt: row.try_get("lastAttempt")?,
        updated_at: row.try_get("updatedAt")?,
    })
}
