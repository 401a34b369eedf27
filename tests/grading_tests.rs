mod common;

use emolearn_backend_rust::services::grading::{
    grade_calc, grade_recap, grade_with_overlay, QuestionKind,
};

use common::{FailingBackend, QueueBackend};

const MATERIAL: &str = "Photosynthesis converts light energy into chemical energy. \
    Chlorophyll inside the chloroplasts absorbs sunlight. Photosynthesis produces \
    glucose and oxygen from carbon dioxide and water.";

#[tokio::test]
async fn test_overlay_rescues_wrong_calculation() {
    let backend = QueueBackend::new(vec![Ok(
        r#"{"score": 90, "isCorrect": true, "feedback": "Right idea, rounding slip."}"#
            .to_string(),
    )]);

    let result = grade_with_overlay(&backend, QuestionKind::Calculation, "2+2?", "4.1", "4").await;

    assert!(result.is_correct);
    assert_eq!(result.score, 90);
    assert_eq!(result.feedback, "Right idea, rounding slip.");
}

#[tokio::test]
async fn test_overlay_never_downgrades_correct_calculation() {
    let backend = QueueBackend::new(vec![Ok(
        r#"{"score": 10, "isCorrect": false, "feedback": "Hmm."}"#.to_string(),
    )]);

    let result = grade_with_overlay(&backend, QuestionKind::Calculation, "2+2?", "4", "4").await;

    assert!(result.is_correct);
    assert_eq!(result.score, 100);
    // Feedback is still adopted; only the verdict is protected.
    assert_eq!(result.feedback, "Hmm.");
}

#[tokio::test]
async fn test_overlay_score_is_authoritative_for_recap() {
    let backend = QueueBackend::new(vec![Ok(
        r#"{"score": 85, "isCorrect": true, "feedback": "Good summary."}"#.to_string(),
    )]);
    let answer = "Photosynthesis uses chlorophyll to turn sunlight into glucose.";

    let result =
        grade_with_overlay(&backend, QuestionKind::Recap, "Summarize.", answer, MATERIAL).await;

    assert!(result.is_correct);
    assert_eq!(result.score, 85);
}

#[tokio::test]
async fn test_overlay_without_verdict_uses_score_floor() {
    let backend = QueueBackend::new(vec![Ok(r#"{"score": 59}"#.to_string())]);
    let answer = "Photosynthesis uses chlorophyll to turn sunlight into glucose.";
    let result =
        grade_with_overlay(&backend, QuestionKind::Recap, "Summarize.", answer, MATERIAL).await;
    assert_eq!(result.score, 59);
    assert!(!result.is_correct);

    let backend = QueueBackend::new(vec![Ok(r#"{"score": 60}"#.to_string())]);
    let result =
        grade_with_overlay(&backend, QuestionKind::Recap, "Summarize.", answer, MATERIAL).await;
    assert_eq!(result.score, 60);
    assert!(result.is_correct);
}

#[tokio::test]
async fn test_backend_failure_keeps_local_grade() {
    let result =
        grade_with_overlay(&FailingBackend, QuestionKind::Calculation, "2+2?", "4", "4").await;
    let local = grade_calc("4", "4");

    assert_eq!(result.is_correct, local.is_correct);
    assert_eq!(result.score, local.score);
    assert_eq!(result.feedback, local.feedback);
}

#[tokio::test]
async fn test_malformed_overlay_output_keeps_local_grade() {
    let backend = QueueBackend::new(vec![Ok("the answer looks fine to me".to_string())]);
    let answer = "Photosynthesis uses chlorophyll to turn sunlight into glucose.";

    let result =
        grade_with_overlay(&backend, QuestionKind::Recap, "Summarize.", answer, MATERIAL).await;
    let local = grade_recap(answer, MATERIAL);

    assert_eq!(result.is_correct, local.is_correct);
    assert_eq!(result.score, local.score);
}

#[tokio::test]
async fn test_out_of_range_overlay_score_is_clamped() {
    let backend = QueueBackend::new(vec![Ok(r#"{"score": 250}"#.to_string())]);
    let answer = "Photosynthesis uses chlorophyll to turn sunlight into glucose.";

    let result =
        grade_with_overlay(&backend, QuestionKind::Recap, "Summarize.", answer, MATERIAL).await;
    assert_eq!(result.score, 100);
    assert!(result.is_correct);
}
