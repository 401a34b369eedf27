use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::db::Db;
use crate::services::artifacts::ArtifactCache;
use crate::services::generators::{DisabledBackend, TextGenerator};
use crate::services::llm_provider::LlmProvider;
use crate::services::remedial::RemedialComposer;

/// Toggles flipped at runtime by operators (debug endpoints in the embedding
/// application).
#[derive(Debug)]
pub struct RuntimeConfig {
    pub llm_enabled: AtomicBool,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self {
            llm_enabled: AtomicBool::new(true),
        }
    }

    pub fn is_llm_enabled(&self) -> bool {
        self.llm_enabled.load(Ordering::Relaxed)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Composition root wiring the store, the LLM backend, and the decision
/// components together for the embedding application.
#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    db: Option<Arc<Db>>,
    llm: Arc<LlmProvider>,
    runtime: Arc<RuntimeConfig>,
}

impl AppState {
    pub fn new(db: Option<Arc<Db>>) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            db,
            llm: Arc::new(LlmProvider::from_env()),
            runtime: Arc::new(RuntimeConfig::new()),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn db(&self) -> Option<Arc<Db>> {
        self.db.clone()
    }

    pub fn llm(&self) -> Arc<LlmProvider> {
        Arc::clone(&self.llm)
    }

    pub fn runtime(&self) -> Arc<RuntimeConfig> {
        Arc::clone(&self.runtime)
    }

    /// The effective text backend: the real provider when enabled and
    /// configured, otherwise a disabled stand-in so every component runs on
    /// its local fallback.
    pub fn generator(&self) -> Arc<dyn TextGenerator> {
        if self.runtime.is_llm_enabled() && self.llm.is_available() {
            Arc::clone(&self.llm) as Arc<dyn TextGenerator>
        } else {
            Arc::new(DisabledBackend)
        }
    }

    pub fn artifact_cache(&self) -> Option<ArtifactCache> {
        self.db
            .clone()
            .map(|db| ArtifactCache::new(db, self.generator()))
    }

    pub fn remedial_composer(&self) -> Option<RemedialComposer> {
        self.db
            .clone()
            .map(|db| RemedialComposer::new(db, self.generator()))
    }
}
