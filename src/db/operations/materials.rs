use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use crate::db::{Db, StoreError};
use crate::services::artifacts::{ArtifactKind, ArtifactStore, VersionedPayload};
use crate::services::fingerprint::{fingerprint, ContentFingerprint};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: String,
    pub title: String,
    pub content: String,
    pub content_version: ContentFingerprint,
    pub ar_recipe: Option<String>,
    pub ar_recipe_ver: Option<String>,
    pub ar_explanation: Option<String>,
    pub ar_explanation_ver: Option<String>,
    pub audio_script: Option<String>,
    pub audio_script_ver: Option<String>,
    pub refined_text: Option<String>,
    pub refined_text_ver: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column pair backing each artifact kind on the materials row. Payload and
/// version always travel together through these.
fn artifact_columns(kind: ArtifactKind) -> (&'static str, &'static str) {
    match kind {
        ArtifactKind::ArRecipe => ("arRecipe", "arRecipeVer"),
        ArtifactKind::ArExplanation => ("arExplanation", "arExplanationVer"),
        ArtifactKind::AudioScript => ("audioScript", "audioScriptVer"),
        ArtifactKind::RefinedText => ("refinedText", "refinedTextVer"),
    }
}

pub async fn get_material(db: &Db, material_id: &str) -> Result<Option<Material>, sqlx::Error> {
    let row = sqlx::query(r#"SELECT * FROM "materials" WHERE "id" = $1 LIMIT 1"#)
        .bind(material_id)
        .fetch_optional(db.pool())
        .await?;
    row.map(|r| map_material(&r)).transpose()
}

pub async fn insert_material(
    db: &Db,
    title: &str,
    content: &str,
) -> Result<Material, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let version = fingerprint(content);
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO "materials" ("id", "title", "content", "contentVersion", "createdAt", "updatedAt")
        VALUES ($1, $2, $3, $4, $5, $5)
        "#,
    )
    .bind(&id)
    .bind(title)
    .bind(content)
    .bind(version.as_str())
    .bind(now)
    .execute(db.pool())
    .await?;

    Ok(Material {
        id,
        title: title.to_string(),
        content: content.to_string(),
        content_version: version,
        ar_recipe: None,
        ar_recipe_ver: None,
        ar_explanation: None,
        ar_explanation_ver: None,
        audio_script: None,
        audio_script_ver: None,
        refined_text: None,
        refined_text_ver: None,
        created_at: now,
        updated_at: now,
    })
}

/// Re-authoring content recomputes the fingerprint, which invalidates every
/// cached artifact at once. The stale payloads stay on the row; version
/// mismatch is what marks them dead.
pub async fn update_material_content(
    db: &Db,
    material_id: &str,
    title: &str,
    content: &str,
) -> Result<ContentFingerprint, sqlx::Error> {
    let version = fingerprint(content);

    sqlx::query(
        r#"
        UPDATE "materials"
        SET "title" = $2, "content" = $3, "contentVersion" = $4, "updatedAt" = $5
        WHERE "id" = $1
        "#,
    )
    .bind(material_id)
    .bind(title)
    .bind(content)
    .bind(version.as_str())
    .bind(Utc::now())
    .execute(db.pool())
    .await?;

    Ok(version)
}

fn map_material(row: &sqlx::postgres::PgRow) -> Result<Material, sqlx::Error> {
    Ok(Material {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        content_version: ContentFingerprint::from_hex(row.try_get::<String, _>("contentVersion")?),
        ar_recipe: row.try_get("arRecipe")?,
        ar_recipe_ver: row.try_get("arRecipeVer")?,
        ar_explanation: row.try_get("arExplanation")?,
        ar_explanation_ver: row.try_get("arExplanationVer")?,
        audio_script: row.try_get("audioScript")?,
        audio_script_ver: row.try_get("audioScriptVer")?,
        refined_text: row.try_get("refinedText")?,
        refined_text_ver: row.try_get("refinedTextVer")?,
        created_at: row.try_get("createdAt")?,
        updated_at: row.try_get("updatedAt")?,
    })
}

#[async_trait]
impl ArtifactStore for Db {
    async fn load(
        &self,
        material_id: &str,
        kind: ArtifactKind,
    ) -> Result<Option<VersionedPayload>, StoreError> {
        let (payload_col, version_col) = artifact_columns(kind);
        let sql = format!(
            r#"SELECT "{payload_col}" AS "payload", "{version_col}" AS "version"
               FROM "materials" WHERE "id" = $1 LIMIT 1"#
        );

        let row = sqlx::query(&sql)
            .bind(material_id)
            .fetch_optional(self.pool())
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: Option<String> = row.try_get("payload").map_err(StoreError::Sqlx)?;
        let version: Option<String> = row.try_get("version").map_err(StoreError::Sqlx)?;

        Ok(match (payload, version) {
            (Some(payload), Some(version)) => Some(VersionedPayload {
                payload,
                version: ContentFingerprint::from_hex(version),
            }),
            _ => None,
        })
    }

    async fn save(
        &self,
        material_id: &str,
        kind: ArtifactKind,
        artifact: &VersionedPayload,
    ) -> Result<(), StoreError> {
        let (payload_col, version_col) = artifact_columns(kind);
        // Single statement: payload and version can never diverge.
        let sql = format!(
            r#"UPDATE "materials"
               SET "{payload_col}" = $2, "{version_col}" = $3, "updatedAt" = $4
               WHERE "id" = $1"#
        );

        sqlx::query(&sql)
            .bind(material_id)
            .bind(&artifact.payload)
            .bind(artifact.version.as_str())
            .bind(Utc::now())
            .execute(self.pool())
            .await?;

        Ok(())
    }
}
