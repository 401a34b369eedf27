pub mod emotions;
pub mod materials;
pub mod quiz;
pub mod remedial;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::{Db, StoreError};
use crate::services::remedial::LearningStore;

#[async_trait]
impl LearningStore for Db {
    async fn recent_attempts(
        &self,
        subject_id: &str,
        material_id: &str,
        limit: i64,
    ) -> Result<Vec<quiz::QuizAttempt>, StoreError> {
        quiz::recent_attempts(self, subject_id, material_id, limit)
            .await
            .map_err(StoreError::Sqlx)
    }

    async fn latest_emotion_since(
        &self,
        subject_id: &str,
        material_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<emotions::EmotionEvent>, StoreError> {
        emotions::latest_emotion_since(self, subject_id, material_id, since)
            .await
            .map_err(StoreError::Sqlx)
    }

    async fn upsert_remedial(&self, doc: &remedial::RemedialDocument) -> Result<(), StoreError> {
        remedial::upsert_remedial(self, doc)
            .await
            .map_err(StoreError::Sqlx)
    }
}
