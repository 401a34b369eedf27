use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::db::StoreError;
use crate::db::operations::materials::Material;
use crate::services::fingerprint::ContentFingerprint;
use crate::services::generators::{
    self, ArRecipe, TextGenerator,
};

/// Derived artifact types cached per material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    ArRecipe,
    ArExplanation,
    AudioScript,
    RefinedText,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArRecipe => "arRecipe",
            Self::ArExplanation => "arExplanation",
            Self::AudioScript => "audioScript",
            Self::RefinedText => "refinedText",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload plus the content version it was generated against. The two are
/// only ever read and written as a pair; a payload without its version (or
/// vice versa) would silently corrupt cache validity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedPayload {
    pub payload: String,
    pub version: ContentFingerprint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactSource {
    Cache,
    Generated,
    Forced,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactOutcome {
    pub kind: ArtifactKind,
    pub payload: String,
    pub version: ContentFingerprint,
    pub source: ArtifactSource,
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact store failed: {0}")]
    Store(#[from] StoreError),
    #[error("artifact encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Persistence seam for cached artifacts. `save` must write payload and
/// version as one atomic update.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn load(
        &self,
        material_id: &str,
        kind: ArtifactKind,
    ) -> Result<Option<VersionedPayload>, StoreError>;

    async fn save(
        &self,
        material_id: &str,
        kind: ArtifactKind,
        artifact: &VersionedPayload,
    ) -> Result<(), StoreError>;
}

/// Get-or-generate cache over one material's derived artifacts, keyed by the
/// material's content fingerprint.
///
/// No cross-caller locking: two concurrent requests for the same stale
/// material may both generate and both save. Last write wins on the atomic
/// payload+version pair, so only efficiency is lost, never consistency.
pub struct ArtifactCache {
    store: Arc<dyn ArtifactStore>,
    backend: Arc<dyn TextGenerator>,
}

impl ArtifactCache {
    pub fn new(store: Arc<dyn ArtifactStore>, backend: Arc<dyn TextGenerator>) -> Self {
        Self { store, backend }
    }

    /// Serves the cached payload when its stored version matches the
    /// material's current content version; otherwise regenerates and
    /// persists. `force` skips the cache-hit check but persists the same
    /// way.
    pub async fn fetch(
        &self,
        material: &Material,
        kind: ArtifactKind,
        force: bool,
    ) -> Result<ArtifactOutcome, ArtifactError> {
        let current = material.content_version.clone();

        if !force {
            if let Some(stored) = self.store.load(&material.id, kind).await? {
                if stored.version == current {
                    debug!(material_id = %material.id, %kind, "artifact cache hit");
                    return Ok(ArtifactOutcome {
                        kind,
                        payload: stored.payload,
                        version: stored.version,
                        source: ArtifactSource::Cache,
                    });
                }
                debug!(material_id = %material.id, %kind, "artifact cache stale");
            }
        }

        let payload = self.generate_payload(material, kind, &current).await?;
        let artifact = VersionedPayload {
            payload,
            version: current,
        };
        self.store.save(&material.id, kind, &artifact).await?;
        info!(material_id = %material.id, %kind, forced = force, "artifact regenerated");

        Ok(ArtifactOutcome {
            kind,
            payload: artifact.payload,
            version: artifact.version,
            source: if force {
                ArtifactSource::Forced
            } else {
                ArtifactSource::Generated
            },
        })
    }

    async fn generate_payload(
        &self,
        material: &Material,
        kind: ArtifactKind,
        current: &ContentFingerprint,
    ) -> Result<String, ArtifactError> {
        let backend = self.backend.as_ref();
        match kind {
            ArtifactKind::ArRecipe => {
                let recipe =
                    generators::generate_ar_recipe(backend, &material.title, &material.content)
                        .await;
                Ok(serde_json::to_string(&recipe)?)
            }
            ArtifactKind::ArExplanation => {
                // Two-level dependency: the recipe must be current before an
                // explanation can be derived from it. The explanation is
                // stamped with the material's version, so one fingerprint
                // comparison validates the whole chain.
                let recipe = self.ensure_current_recipe(material, current).await?;
                Ok(generators::generate_ar_explanation(
                    backend,
                    &material.title,
                    &material.content,
                    &recipe,
                )
                .await)
            }
            ArtifactKind::AudioScript => Ok(generators::generate_audio_script(
                backend,
                &material.title,
                &material.content,
            )
            .await),
            ArtifactKind::RefinedText => Ok(generators::generate_refined_text(
                backend,
                &material.title,
                &material.content,
            )
            .await),
        }
    }

    async fn ensure_current_recipe(
        &self,
        material: &Material,
        current: &ContentFingerprint,
    ) -> Result<ArRecipe, ArtifactError> {
        if let Some(stored) = self.store.load(&material.id, ArtifactKind::ArRecipe).await? {
            if stored.version == *current {
                if let Ok(recipe) = serde_json::from_str::<ArRecipe>(&stored.payload) {
                    return Ok(recipe);
                }
                // Unparseable rows fall through to regeneration.
            }
        }

        let recipe = generators::generate_ar_recipe(
            self.backend.as_ref(),
            &material.title,
            &material.content,
        )
        .await;
        let artifact = VersionedPayload {
            payload: serde_json::to_string(&recipe)?,
            version: current.clone(),
        };
        self.store
            .save(&material.id, ArtifactKind::ArRecipe, &artifact)
            .await?;
        info!(material_id = %material.id, "recipe regenerated for explanation chain");
        Ok(recipe)
    }
}
