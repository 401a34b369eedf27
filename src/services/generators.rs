use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::services::difficulty::Difficulty;
use crate::services::emotion::EmotionLabel;

pub const AUDIO_SCRIPT_MAX_CHARS: usize = 1400;
const FALLBACK_SENTENCES: usize = 3;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub max_output_tokens: u32,
    pub temperature: f64,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_output_tokens: 1024,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation backend unavailable: {0}")]
    Backend(String),
    #[error("malformed model output: {0}")]
    Malformed(String),
}

/// Seam over the text backend. The production implementation is
/// `LlmProvider`; tests script this trait directly.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, GenerationError>;
}

/// Backend stand-in used when the LLM is disabled or unconfigured. Every
/// caller then takes its deterministic fallback path.
pub struct DisabledBackend;

#[async_trait]
impl TextGenerator for DisabledBackend {
    async fn generate_text(
        &self,
        _prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<String, GenerationError> {
        Err(GenerationError::Backend("LLM backend disabled".into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArRecipe {
    pub template: String,
    pub title: String,
    pub short_goal: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub expected_answer: Option<String>,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// AR activity recipe for a material. Malformed or unavailable model output
/// degrades to a deterministic local recipe, never to an error.
pub async fn generate_ar_recipe(
    backend: &dyn TextGenerator,
    title: &str,
    content: &str,
) -> ArRecipe {
    let prompt = format!(
        "You design short augmented-reality classroom activities.\n\
         Material title: {title}\n\
         Material content:\n{content}\n\n\
         Reply with JSON only: {{\"template\": string, \"title\": string, \
         \"shortGoal\": string, \"steps\": [3 to 6 short strings]}}"
    );

    match backend.generate_text(&prompt, &GenerateOptions::default()).await {
        Ok(raw) => match parse_recipe(&raw) {
            Some(recipe) => recipe,
            None => {
                warn!(title, "AR recipe output unparseable, using local recipe");
                fallback_recipe(title, content)
            }
        },
        Err(err) => {
            warn!(title, error = %err, "AR recipe generation failed, using local recipe");
            fallback_recipe(title, content)
        }
    }
}

/// Explanation text for an already-current recipe. Fallback: the material's
/// lead sentences.
pub async fn generate_ar_explanation(
    backend: &dyn TextGenerator,
    title: &str,
    content: &str,
    recipe: &ArRecipe,
) -> String {
    let steps = recipe.steps.join("; ");
    let prompt = format!(
        "Explain to a student why the AR activity below helps them learn the material. \
         Keep it under 200 words, plain prose.\n\
         Material title: {title}\n\
         Material content:\n{content}\n\
         Activity goal: {goal}\nActivity steps: {steps}",
        goal = recipe.short_goal,
    );

    match backend.generate_text(&prompt, &GenerateOptions::default()).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => lead_sentences(content, FALLBACK_SENTENCES),
        Err(err) => {
            warn!(title, error = %err, "AR explanation generation failed, using lead sentences");
            lead_sentences(content, FALLBACK_SENTENCES)
        }
    }
}

/// Narration script for audio playback, hard-capped at 1400 chars. The cap
/// applies to the fallback too.
pub async fn generate_audio_script(
    backend: &dyn TextGenerator,
    title: &str,
    content: &str,
) -> String {
    let prompt = format!(
        "Write a friendly narration script (max 1400 characters, no stage \
         directions) that reads the material below aloud for a student.\n\
         Title: {title}\nContent:\n{content}"
    );

    let script = match backend.generate_text(&prompt, &GenerateOptions::default()).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => lead_sentences(content, FALLBACK_SENTENCES),
        Err(err) => {
            warn!(title, error = %err, "audio script generation failed, using lead sentences");
            lead_sentences(content, FALLBACK_SENTENCES)
        }
    };
    truncate_chars(&script, AUDIO_SCRIPT_MAX_CHARS)
}

/// Simplified rewrite of the material for struggling readers. Fallback: the
/// material's lead sentences.
pub async fn generate_refined_text(
    backend: &dyn TextGenerator,
    title: &str,
    content: &str,
) -> String {
    let prompt = format!(
        "Rewrite the material below in simpler language for a struggling \
         student. Keep every key fact, use short sentences.\n\
         Title: {title}\nContent:\n{content}"
    );

    match backend.generate_text(&prompt, &GenerateOptions::default()).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => lead_sentences(content, FALLBACK_SENTENCES),
        Err(err) => {
            warn!(title, error = %err, "refined text generation failed, using lead sentences");
            lead_sentences(content, FALLBACK_SENTENCES)
        }
    }
}

/// Quiz question for the adaptive flow. No local fallback exists — a quiz
/// item cannot be faked from the source text — so failure propagates.
pub async fn generate_quiz_question(
    backend: &dyn TextGenerator,
    content: &str,
    emotion: EmotionLabel,
    learning_style: &str,
    difficulty: Difficulty,
    index: usize,
    avoid_questions: &[String],
) -> Result<QuizQuestion, GenerationError> {
    let avoid = if avoid_questions.is_empty() {
        String::new()
    } else {
        format!(
            "Do not repeat any of these questions:\n- {}\n",
            avoid_questions.join("\n- ")
        )
    };
    let prompt = format!(
        "Create quiz question #{number} about the material below.\n\
         Student emotion: {emotion}. Learning style: {learning_style}. \
         Target difficulty: {difficulty}.\n{avoid}\
         Material:\n{content}\n\n\
         Reply with JSON only: {{\"question\": string, \"expectedAnswer\": \
         string or null, \"hint\": string or null}}",
        number = index + 1,
    );

    let options = GenerateOptions {
        temperature: 0.8,
        ..GenerateOptions::default()
    };
    let raw = backend.generate_text(&prompt, &options).await?;
    let payload = extract_json(&raw)
        .ok_or_else(|| GenerationError::Malformed("no JSON object in output".into()))?;

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct QuestionPayload {
        question: String,
        expected_answer: Option<String>,
        hint: Option<String>,
    }

    let parsed: QuestionPayload = serde_json::from_str(payload)
        .map_err(|e| GenerationError::Malformed(e.to_string()))?;
    if parsed.question.trim().is_empty() {
        return Err(GenerationError::Malformed("empty question".into()));
    }

    Ok(QuizQuestion {
        question: parsed.question.trim().to_string(),
        expected_answer: parsed.expected_answer.filter(|a| !a.trim().is_empty()),
        difficulty,
        hint: parsed.hint.filter(|h| !h.trim().is_empty()),
    })
}

fn parse_recipe(raw: &str) -> Option<ArRecipe> {
    let payload = extract_json(raw)?;
    let recipe: ArRecipe = serde_json::from_str(payload).ok()?;
    if recipe.steps.len() < 3 || recipe.steps.len() > 6 {
        return None;
    }
    if recipe.title.trim().is_empty() || recipe.short_goal.trim().is_empty() {
        return None;
    }
    Some(recipe)
}

/// Deterministic recipe used whenever the backend cannot supply one.
pub fn fallback_recipe(title: &str, content: &str) -> ArRecipe {
    let goal = lead_sentences(content, 1);
    let goal = if goal.is_empty() {
        format!("Explore {title} hands-on")
    } else {
        goal
    };
    ArRecipe {
        template: "markerless-tabletop".to_string(),
        title: format!("Explore: {title}"),
        short_goal: goal,
        steps: vec![
            format!("Point your camera at a flat surface to place the {title} scene"),
            "Walk around the model and observe it from every side".to_string(),
            "Tap each highlighted part to hear what it does".to_string(),
            "Retell what you saw in your own words".to_string(),
        ],
    }
}

/// First `max` sentences of a text, used as the deterministic local stand-in
/// for generated prose.
pub fn lead_sentences(text: &str, max: usize) -> String {
    let mut out = String::new();
    let mut count = 0;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(sentence);
                count += 1;
                if count >= max {
                    return out;
                }
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if count == 0 && !tail.is_empty() {
        return tail.to_string();
    }
    if count < max && !tail.is_empty() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(tail);
    }
    out
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

/// Slice between the first `{` and the last `}` so fenced or chatty model
/// output still parses.
pub(crate) fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_sentences() {
        let text = "Plants make food. They use sunlight! Roots drink water? Leaves breathe.";
        assert_eq!(lead_sentences(text, 2), "Plants make food. They use sunlight!");
        assert_eq!(lead_sentences("no terminator here", 2), "no terminator here");
        assert_eq!(lead_sentences("", 3), "");
    }

    #[test]
    fn test_extract_json_tolerates_fences() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(raw), Some("{\"a\": 1}"));
        assert_eq!(extract_json("no braces"), None);
    }

    #[test]
    fn test_parse_recipe_rejects_bad_step_counts() {
        let two_steps = r#"{"template":"t","title":"x","shortGoal":"g","steps":["a","b"]}"#;
        assert!(parse_recipe(two_steps).is_none());
        let four_steps = r#"{"template":"t","title":"x","shortGoal":"g","steps":["a","b","c","d"]}"#;
        assert!(parse_recipe(four_steps).is_some());
    }

    #[test]
    fn test_fallback_recipe_shape() {
        let recipe = fallback_recipe("The Water Cycle", "Water evaporates. It condenses.");
        assert_eq!(recipe.short_goal, "Water evaporates.");
        assert!(recipe.steps.len() >= 3 && recipe.steps.len() <= 6);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("ok", 10), "ok");
    }

    struct CannedBackend(Result<&'static str, ()>);

    #[async_trait]
    impl TextGenerator for CannedBackend {
        async fn generate_text(
            &self,
            _prompt: &str,
            _options: &GenerateOptions,
        ) -> Result<String, GenerationError> {
            self.0
                .map(str::to_string)
                .map_err(|_| GenerationError::Backend("down".into()))
        }
    }

    #[tokio::test]
    async fn test_quiz_question_parses_payload() {
        let backend = CannedBackend(Ok(
            r#"{"question":"What does chlorophyll absorb?","expectedAnswer":"light","hint":""}"#,
        ));
        let q = generate_quiz_question(
            &backend,
            "Chlorophyll absorbs light.",
            EmotionLabel::Neutral,
            "visual",
            Difficulty::Medium,
            0,
            &[],
        )
        .await
        .unwrap();
        assert_eq!(q.question, "What does chlorophyll absorb?");
        assert_eq!(q.expected_answer.as_deref(), Some("light"));
        assert_eq!(q.difficulty, Difficulty::Medium);
        assert!(q.hint.is_none());
    }

    #[tokio::test]
    async fn test_quiz_question_failure_propagates() {
        let backend = CannedBackend(Err(()));
        let result = generate_quiz_question(
            &backend,
            "Chlorophyll absorbs light.",
            EmotionLabel::Neutral,
            "visual",
            Difficulty::Easy,
            0,
            &[],
        )
        .await;
        assert!(matches!(result, Err(GenerationError::Backend(_))));
    }
}
