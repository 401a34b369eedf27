use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable content hash used as the cache-validity key for every derived
/// artifact. Identical text always yields the same fingerprint; any edit
/// changes it and thereby invalidates all caches at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rehydrates a fingerprint previously persisted as hex. Used by the
    /// store layer; never validated beyond being carried opaquely.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }
}

impl std::fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 of the raw text, rendered as 64 lowercase hex chars.
pub fn fingerprint(text: &str) -> ContentFingerprint {
    let digest = Sha256::digest(text.as_bytes());
    ContentFingerprint(hex::encode(digest))
}
