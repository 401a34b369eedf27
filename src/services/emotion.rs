use serde::{Deserialize, Serialize};

/// Reduced emotion taxonomy every downstream decision operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Negative,
    Neutral,
    Positive,
}

impl EmotionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Positive => "positive",
        }
    }
}

impl std::fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an arbitrary raw label (webcam classifier output, legacy stored
/// values, multi-valued compounds like "happy/neutral") to the canonical
/// taxonomy. Total: unknown input degrades to Neutral, never fails.
pub fn canonicalize(raw: &str) -> EmotionLabel {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return EmotionLabel::Neutral;
    }

    // Legacy rows sometimes carry compounds; first recognized token wins.
    for token in trimmed.split(|c| c == ',' || c == '/' || c == ';') {
        if let Some(label) = canonicalize_single(token) {
            return label;
        }
    }
    EmotionLabel::Neutral
}

fn canonicalize_single(token: &str) -> Option<EmotionLabel> {
    match token.trim().to_lowercase().as_str() {
        "positive" | "happy" => Some(EmotionLabel::Positive),
        "negative" | "anxious" | "confused" | "frustrated" | "sad" | "angry" | "fearful"
        | "disgusted" => Some(EmotionLabel::Negative),
        "neutral" | "surprised" => Some(EmotionLabel::Neutral),
        _ => None,
    }
}
