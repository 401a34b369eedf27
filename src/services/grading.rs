use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::services::generators::{extract_json, GenerateOptions, TextGenerator};

const CALC_TOLERANCE: f64 = 1e-6;
const RECAP_MIN_ANSWER_CHARS: usize = 40;
const RECAP_KEYWORD_COUNT: usize = 8;
const RECAP_MIN_TOKEN_LEN: usize = 4;
const AI_CORRECT_SCORE_FLOOR: f64 = 60.0;

/// Tokens too generic to count as material keywords.
const STOP_WORDS: &[&str] = &[
    "that", "this", "with", "from", "have", "they", "will", "your", "which",
    "their", "about", "would", "there", "been", "were", "what", "when", "then",
    "than", "because", "into", "also", "these", "those", "such", "each",
    "other", "some", "more", "very", "only", "over", "after", "before",
    "between", "while", "where", "both", "many", "most", "through", "being",
    "does", "upon", "them", "must", "just", "like", "make", "made", "used",
    "using",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Calculation,
    Recap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResult {
    pub is_correct: bool,
    pub score: i32,
    pub feedback: String,
}

/// Second opinion returned by the backend. All fields optional: the merge
/// policy only trusts what actually came back.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiGrade {
    pub score: Option<f64>,
    pub is_correct: Option<bool>,
    pub feedback: Option<String>,
}

/// Deterministic grader for calculation questions: exact numeric match
/// within tolerance, binary score.
pub fn grade_calc(user_answer: &str, expected_answer: &str) -> GradeResult {
    let user = parse_numeric(user_answer);
    let expected = parse_numeric(expected_answer);

    match (user, expected) {
        (Some(u), Some(e)) => {
            let is_correct = (u - e).abs() <= CALC_TOLERANCE;
            GradeResult {
                is_correct,
                score: if is_correct { 100 } else { 0 },
                feedback: if is_correct {
                    "Correct — your calculation checks out.".to_string()
                } else {
                    "Not quite. Recheck each step of your calculation.".to_string()
                },
            }
        }
        _ => GradeResult {
            is_correct: false,
            score: 0,
            feedback: "Please answer with a number.".to_string(),
        },
    }
}

fn parse_numeric(raw: &str) -> Option<f64> {
    let normalized: String = raw
        .trim()
        .replace(',', ".")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if normalized.is_empty() {
        return None;
    }
    normalized.parse::<f64>().ok()
}

/// Deterministic grader for recap questions: keyword coverage of the source
/// material plus a minimum-length gate.
pub fn grade_recap(user_answer: &str, material_text: &str) -> GradeResult {
    let keywords = extract_keywords(material_text, RECAP_KEYWORD_COUNT);
    let answer = user_answer.trim().to_lowercase();

    let hits = keywords
        .iter()
        .filter(|kw| answer.contains(kw.as_str()))
        .count();
    let long_enough = answer.chars().count() >= RECAP_MIN_ANSWER_CHARS;

    let (is_correct, score, feedback) = if hits >= 2 && long_enough {
        (true, 100, "Good recap — you covered the key ideas.".to_string())
    } else if hits >= 1 && long_enough {
        (
            false,
            70,
            "You touched one key idea. What else did the material cover?".to_string(),
        )
    } else if long_enough {
        (
            false,
            50,
            "Your answer is detailed but misses the material's key terms.".to_string(),
        )
    } else {
        (
            false,
            0,
            "Try writing a few full sentences using ideas from the material.".to_string(),
        )
    };

    GradeResult {
        is_correct,
        score,
        feedback,
    }
}

/// Top keywords of a text: lowercase alphanumeric tokens, short and stop
/// words dropped, ranked by frequency descending. The sort is stable, so
/// equal-frequency tokens keep first-appearance order.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in cleaned.split_whitespace() {
        if token.chars().count() < RECAP_MIN_TOKEN_LEN || STOP_WORDS.contains(&token) {
            continue;
        }
        let entry = counts.entry(token.to_string()).or_insert(0);
        if *entry == 0 {
            order.push(token.to_string());
        }
        *entry += 1;
    }

    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.truncate(limit);
    order
}

/// The asymmetric trust policy between the local grader and the backend's
/// second opinion, kept as one pure function so it is testable on its own.
///
/// Recap answers are open-ended, so a returned AI score is authoritative.
/// Calculation answers have exact ground truth: a local `correct` is never
/// overridden, the AI may only rescue a local `incorrect`.
pub fn merge_grades(local: GradeResult, ai: Option<AiGrade>, kind: QuestionKind) -> GradeResult {
    let Some(ai) = ai else {
        return local;
    };

    let mut merged = local.clone();

    match kind {
        QuestionKind::Recap => {
            if let Some(score) = ai.score {
                let score = score.clamp(0.0, 100.0).round() as i32;
                merged.score = score;
                merged.is_correct = ai
                    .is_correct
                    .unwrap_or(f64::from(score) >= AI_CORRECT_SCORE_FLOOR);
            }
        }
        QuestionKind::Calculation => {
            if !local.is_correct {
                if let Some(score) = ai.score {
                    let score = score.clamp(0.0, 100.0).round() as i32;
                    merged.score = score;
                    merged.is_correct = ai
                        .is_correct
                        .unwrap_or(f64::from(score) >= AI_CORRECT_SCORE_FLOOR);
                }
            }
        }
    }

    if let Some(feedback) = ai.feedback {
        if !feedback.trim().is_empty() {
            merged.feedback = feedback.trim().to_string();
        }
    }

    merged
}

/// Grades locally, then asks the backend for a second opinion and merges.
/// Backend or parse failure keeps the local result — a turn is never left
/// ungraded.
pub async fn grade_with_overlay(
    backend: &dyn TextGenerator,
    kind: QuestionKind,
    question: &str,
    user_answer: &str,
    reference: &str,
) -> GradeResult {
    let local = match kind {
        QuestionKind::Calculation => grade_calc(user_answer, reference),
        QuestionKind::Recap => grade_recap(user_answer, reference),
    };

    let ai = match request_ai_grade(backend, kind, question, user_answer, reference).await {
        Ok(grade) => Some(grade),
        Err(err) => {
            warn!(error = %err, "AI grading overlay failed, keeping local grade");
            None
        }
    };

    merge_grades(local, ai, kind)
}

async fn request_ai_grade(
    backend: &dyn TextGenerator,
    kind: QuestionKind,
    question: &str,
    user_answer: &str,
    reference: &str,
) -> Result<AiGrade, String> {
    let reference_block = match kind {
        QuestionKind::Calculation => format!("Expected answer: {reference}"),
        QuestionKind::Recap => format!("Source material:\n{reference}"),
    };
    let prompt = format!(
        "Grade the student's answer.\nQuestion: {question}\n\
         Student answer: {user_answer}\n{reference_block}\n\n\
         Reply with JSON only: {{\"score\": 0-100, \"isCorrect\": bool, \
         \"feedback\": one or two encouraging sentences}}"
    );

    let options = GenerateOptions {
        max_output_tokens: 256,
        temperature: 0.2,
    };
    let raw = backend
        .generate_text(&prompt, &options)
        .await
        .map_err(|e| e.to_string())?;
    let payload = extract_json(&raw).ok_or("no JSON object in grading output")?;
    serde_json::from_str(payload).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_tolerance_boundary() {
        // 1e-6 in decimal lands just above the tolerance in binary.
        assert!(!grade_calc("5", "5.000001").is_correct);
        assert!(grade_calc("5.0000001", "5").is_correct);
        assert!(grade_calc("5", "5").is_correct);
    }

    #[test]
    fn test_calc_normalization() {
        assert!(grade_calc("3,5", "3.5").is_correct);
        assert!(grade_calc("  42 kg", "42").is_correct);
        assert!(grade_calc("-7", "-7.0").is_correct);
    }

    #[test]
    fn test_calc_non_numeric_scores_zero() {
        let result = grade_calc("abc", "5");
        assert!(!result.is_correct);
        assert_eq!(result.score, 0);
        let result = grade_calc("5", "unknown");
        assert_eq!(result.score, 0);
    }

    const MATERIAL: &str = "Photosynthesis lets plants convert sunlight into \
        energy. Chlorophyll inside leaves absorbs sunlight, and plants \
        release oxygen while storing energy as glucose. Photosynthesis \
        needs water and carbon dioxide.";

    #[test]
    fn test_recap_short_answer_always_zero() {
        let result = grade_recap("photosynthesis sunlight", MATERIAL);
        assert_eq!(result.score, 0);
        assert!(!result.is_correct);
    }

    #[test]
    fn test_recap_scoring_tiers() {
        let full = "Plants use photosynthesis to turn sunlight into energy and release oxygen.";
        let result = grade_recap(full, MATERIAL);
        assert!(result.is_correct);
        assert_eq!(result.score, 100);

        let vague = "It is a process where green things in nature feed on light somehow.";
        let result = grade_recap(vague, MATERIAL);
        assert!(!result.is_correct);
        assert_eq!(result.score, 50);
    }

    #[test]
    fn test_keyword_extraction_ranks_by_frequency() {
        let keywords = extract_keywords(MATERIAL, 8);
        assert_eq!(keywords.first().map(String::as_str), Some("photosynthesis"));
        assert!(keywords.contains(&"sunlight".to_string()));
        assert!(keywords.len() <= 8);
        assert!(!keywords.iter().any(|k| k == "into"));
    }

    #[test]
    fn test_merge_recap_ai_is_authoritative() {
        let local = grade_recap("short", MATERIAL);
        let ai = AiGrade {
            score: Some(85.0),
            is_correct: Some(true),
            feedback: Some("Nice summary.".to_string()),
        };
        let merged = merge_grades(local, Some(ai), QuestionKind::Recap);
        assert!(merged.is_correct);
        assert_eq!(merged.score, 85);
        assert_eq!(merged.feedback, "Nice summary.");
    }

    #[test]
    fn test_merge_calc_never_overrides_local_correct() {
        let local = grade_calc("5", "5");
        let ai = AiGrade {
            score: Some(0.0),
            is_correct: Some(false),
            feedback: Some("Wrong.".to_string()),
        };
        let merged = merge_grades(local, Some(ai), QuestionKind::Calculation);
        assert!(merged.is_correct);
        assert_eq!(merged.score, 100);
        // Feedback is still the AI's.
        assert_eq!(merged.feedback, "Wrong.");
    }

    #[test]
    fn test_merge_calc_ai_rescues_local_incorrect() {
        let local = grade_calc("4.9", "5");
        let ai = AiGrade {
            score: Some(80.0),
            is_correct: None,
            feedback: None,
        };
        let merged = merge_grades(local, Some(ai), QuestionKind::Calculation);
        assert!(merged.is_correct);
        assert_eq!(merged.score, 80);
        assert_eq!(merged.feedback, grade_calc("4.9", "5").feedback);
    }

    #[test]
    fn test_merge_without_ai_keeps_local() {
        let local = grade_calc("5", "5");
        let merged = merge_grades(local.clone(), None, QuestionKind::Calculation);
        assert_eq!(merged, local);
    }
}
