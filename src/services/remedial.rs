use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::operations::emotions::EmotionEvent;
use crate::db::operations::materials::Material;
use crate::db::operations::quiz::QuizAttempt;
use crate::db::operations::remedial::RemedialDocument;
use crate::db::StoreError;
use crate::services::emotion::EmotionLabel;
use crate::services::generators::{GenerateOptions, TextGenerator};

const EMOTION_WINDOW_MINUTES: i64 = 10;
const SUMMARY_ATTEMPT_COUNT: i64 = 6;
const SUMMARY_WRONG_BELOW_SCORE: i32 = 80;
const MIN_USABLE_CHARS: usize = 80;

const UNAVAILABLE_PLACEHOLDER: &str = "[Remedial generation unavailable] \
    We could not prepare a personalized review right now. Please reread the \
    material and retry the quiz; a fresh review will be generated on your \
    next attempt.";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub average_score: f64,
    pub wrong_count: u32,
}

/// Average score over the supplied attempts, with below-threshold attempts
/// counted as wrong. Empty input carries no summary.
pub fn summarize_attempts(attempts: &[QuizAttempt]) -> Option<PerformanceSummary> {
    if attempts.is_empty() {
        return None;
    }
    let total: i64 = attempts.iter().map(|a| i64::from(a.score)).sum();
    let wrong = attempts
        .iter()
        .filter(|a| a.score < SUMMARY_WRONG_BELOW_SCORE)
        .count();
    Some(PerformanceSummary {
        average_score: total as f64 / attempts.len() as f64,
        wrong_count: wrong as u32,
    })
}

/// Persistence seam the composer reads context from and writes the finished
/// document to.
#[async_trait]
pub trait LearningStore: Send + Sync {
    async fn recent_attempts(
        &self,
        subject_id: &str,
        material_id: &str,
        limit: i64,
    ) -> Result<Vec<QuizAttempt>, StoreError>;

    async fn latest_emotion_since(
        &self,
        subject_id: &str,
        material_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<EmotionEvent>, StoreError>;

    async fn upsert_remedial(&self, doc: &RemedialDocument) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum RemedialError {
    #[error("remedial store failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default)]
pub struct RemedialRequest {
    pub learning_style: String,
    pub emotion: Option<EmotionLabel>,
    pub last_attempt: Option<QuizAttempt>,
    pub performance: Option<PerformanceSummary>,
}

/// Gathers emotional and performance context for a (subject, material) pair,
/// generates one remedial document, and upserts it. Generation failure or a
/// too-thin result is replaced by a labeled placeholder rather than surfaced
/// or persisted as-is.
pub struct RemedialComposer {
    store: Arc<dyn LearningStore>,
    backend: Arc<dyn TextGenerator>,
}

impl RemedialComposer {
    pub fn new(store: Arc<dyn LearningStore>, backend: Arc<dyn TextGenerator>) -> Self {
        Self { store, backend }
    }

    pub async fn compose(
        &self,
        subject_id: &str,
        material: &Material,
        request: RemedialRequest,
    ) -> Result<RemedialDocument, RemedialError> {
        let recent = match (&request.performance, &request.last_attempt) {
            (Some(_), Some(_)) => Vec::new(),
            _ => {
                self.store
                    .recent_attempts(subject_id, &material.id, SUMMARY_ATTEMPT_COUNT)
                    .await?
            }
        };

        let emotion = match request.emotion {
            Some(emotion) => emotion,
            None => self.lookup_recent_emotion(subject_id, &material.id).await?,
        };
        let performance = request.performance.or_else(|| summarize_attempts(&recent));
        let last_attempt = request.last_attempt.or_else(|| recent.first().cloned());

        let content = self
            .generate_document(material, &request.learning_style, emotion, &last_attempt, &performance)
            .await;

        let doc = RemedialDocument {
            subject_id: subject_id.to_string(),
            material_id: material.id.clone(),
            content,
            emotion,
            material_version: material.content_version.to_string(),
            average_score: performance.map_or(0.0, |p| p.average_score),
            wrong_count: performance.map_or(0, |p| p.wrong_count as i32),
            last_attempt: last_attempt.map(|a| {
                format!(
                    "Q: {} | A: {} | score {}",
                    a.question, a.answer, a.score
                )
            }),
            updated_at: Utc::now(),
        };

        self.store.upsert_remedial(&doc).await?;
        info!(subject_id, material_id = %material.id, emotion = %doc.emotion, "remedial document upserted");
        Ok(doc)
    }

    /// Most recent emotion for the pair within a trailing window; no event
    /// means no evidence, which defaults to Neutral.
    async fn lookup_recent_emotion(
        &self,
        subject_id: &str,
        material_id: &str,
    ) -> Result<EmotionLabel, StoreError> {
        let since = Utc::now() - Duration::minutes(EMOTION_WINDOW_MINUTES);
        let event = self
            .store
            .latest_emotion_since(subject_id, material_id, since)
            .await?;
        Ok(event.map_or(EmotionLabel::Neutral, |e| e.canonical))
    }

    async fn generate_document(
        &self,
        material: &Material,
        learning_style: &str,
        emotion: EmotionLabel,
        last_attempt: &Option<QuizAttempt>,
        performance: &Option<PerformanceSummary>,
    ) -> String {
        let attempt_block = last_attempt.as_ref().map_or_else(String::new, |a| {
            format!(
                "Last attempt — question: {q}; student answered: {ans}; scored {score}.\n",
                q = a.question,
                ans = a.answer,
                score = a.score
            )
        });
        let performance_block = performance.map_or_else(String::new, |p| {
            format!(
                "Recent performance — average score {avg:.0}, {wrong} low-scoring attempts.\n",
                avg = p.average_score,
                wrong = p.wrong_count
            )
        });
        let prompt = format!(
            "Write a short remedial study guide for one student.\n\
             Student emotion: {emotion}. Learning style: {learning_style}.\n\
             {performance_block}{attempt_block}\
             Material title: {title}\nMaterial content:\n{content}\n\n\
             Focus on what the student most likely misunderstood, keep the tone \
             supportive, and end with two concrete practice suggestions.",
            title = material.title,
            content = material.content,
        );

        let options = GenerateOptions {
            max_output_tokens: 2048,
            temperature: 0.6,
        };
        match self.backend.generate_text(&prompt, &options).await {
            Ok(text) if text.trim().chars().count() >= MIN_USABLE_CHARS => {
                text.trim().to_string()
            }
            Ok(_) => {
                warn!(material_id = %material.id, "remedial output below usable length, using placeholder");
                UNAVAILABLE_PLACEHOLDER.to_string()
            }
            Err(err) => {
                warn!(material_id = %material.id, error = %err, "remedial generation failed, using placeholder");
                UNAVAILABLE_PLACEHOLDER.to_string()
            }
        }
    }
}
