#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use emolearn_backend_rust::db::operations::emotions::EmotionEvent;
use emolearn_backend_rust::db::operations::materials::Material;
use emolearn_backend_rust::db::operations::quiz::QuizAttempt;
use emolearn_backend_rust::db::operations::remedial::RemedialDocument;
use emolearn_backend_rust::db::StoreError;
use emolearn_backend_rust::services::artifacts::{ArtifactKind, ArtifactStore, VersionedPayload};
use emolearn_backend_rust::services::emotion::EmotionLabel;
use emolearn_backend_rust::services::fingerprint::fingerprint;
use emolearn_backend_rust::services::generators::{
    GenerateOptions, GenerationError, TextGenerator,
};
use emolearn_backend_rust::services::remedial::LearningStore;

pub fn sample_material(id: &str, title: &str, content: &str) -> Material {
    let now = Utc::now();
    Material {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        content_version: fingerprint(content),
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
    }
}

pub fn sample_attempt(subject: &str, material: &str, score: i32) -> QuizAttempt {
    QuizAttempt {
        id: uuid::Uuid::new_v4().to_string(),
        subject_id: subject.to_string(),
        material_id: material.to_string(),
        question: "What did the material explain?".to_string(),
        answer: "An answer.".to_string(),
        expected_answer: None,
        emotion: EmotionLabel::Neutral,
        is_correct: score >= 80,
        score,
        feedback: String::new(),
        created_at: Utc::now(),
    }
}

pub fn sample_emotion(
    subject: &str,
    material: &str,
    raw: &str,
    canonical: EmotionLabel,
    at: DateTime<Utc>,
) -> EmotionEvent {
    EmotionEvent {
        id: uuid::Uuid::new_v4().to_string(),
        subject_id: subject.to_string(),
        material_id: Some(material.to_string()),
        raw_label: raw.to_string(),
        canonical,
        confidence: 0.9,
        created_at: at,
    }
}

/// In-memory stand-in for the Postgres store, shared by the artifact cache
/// and remedial composer tests.
#[derive(Default)]
pub struct MemoryStore {
    pub artifacts: Mutex<HashMap<(String, ArtifactKind), VersionedPayload>>,
    pub attempts: Mutex<Vec<QuizAttempt>>,
    pub emotions: Mutex<Vec<EmotionEvent>>,
    pub remedials: Mutex<HashMap<(String, String), RemedialDocument>>,
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn load(
        &self,
        material_id: &str,
        kind: ArtifactKind,
    ) -> Result<Option<VersionedPayload>, StoreError> {
        let artifacts = self.artifacts.lock().unwrap();
        Ok(artifacts.get(&(material_id.to_string(), kind)).cloned())
    }

    async fn save(
        &self,
        material_id: &str,
        kind: ArtifactKind,
        artifact: &VersionedPayload,
    ) -> Result<(), StoreError> {
        let mut artifacts = self.artifacts.lock().unwrap();
        artifacts.insert((material_id.to_string(), kind), artifact.clone());
        Ok(())
    }
}

#[async_trait]
impl LearningStore for MemoryStore {
    async fn recent_attempts(
        &self,
        subject_id: &str,
        material_id: &str,
        limit: i64,
    ) -> Result<Vec<QuizAttempt>, StoreError> {
        let attempts = self.attempts.lock().unwrap();
        let mut matching: Vec<QuizAttempt> = attempts
            .iter()
            .filter(|a| a.subject_id == subject_id && a.material_id == material_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn latest_emotion_since(
        &self,
        subject_id: &str,
        material_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<EmotionEvent>, StoreError> {
        let emotions = self.emotions.lock().unwrap();
        Ok(emotions
            .iter()
            .filter(|e| {
                e.subject_id == subject_id
                    && e.material_id.as_deref() == Some(material_id)
                    && e.created_at >= since
            })
            .max_by_key(|e| e.created_at)
            .cloned())
    }

    async fn upsert_remedial(&self, doc: &RemedialDocument) -> Result<(), StoreError> {
        let mut remedials = self.remedials.lock().unwrap();
        remedials.insert(
            (doc.subject_id.clone(), doc.material_id.clone()),
            doc.clone(),
        );
        Ok(())
    }
}

/// Backend returning the same reply for every prompt, counting calls.
pub struct FixedBackend {
    reply: String,
    pub calls: AtomicUsize,
}

impl FixedBackend {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FixedBackend {
    async fn generate_text(
        &self,
        _prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Backend replaying a scripted sequence of replies; exhausting the script
/// fails the call.
pub struct QueueBackend {
    replies: Mutex<VecDeque<Result<String, String>>>,
}

impl QueueBackend {
    pub fn new(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }
}

#[async_trait]
impl TextGenerator for QueueBackend {
    async fn generate_text(
        &self,
        _prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<String, GenerationError> {
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(GenerationError::Backend(message)),
            None => Err(GenerationError::Backend("script exhausted".to_string())),
        }
    }
}

/// Backend that always fails, driving every component onto its fallback.
pub struct FailingBackend;

#[async_trait]
impl TextGenerator for FailingBackend {
    async fn generate_text(
        &self,
        _prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<String, GenerationError> {
        Err(GenerationError::Backend("backend unreachable".to_string()))
    }
}
