use emolearn_backend_rust::services::anxiety::has_sustained_distress;
use emolearn_backend_rust::services::difficulty::{
    decide_difficulty, effective_difficulty, Difficulty,
};
use emolearn_backend_rust::services::emotion::{canonicalize, EmotionLabel};

#[test]
fn integration_quiz_turn_decision_flow() {
    // A confident fast turn: raw classifier label feeds the override layer.
    let emotion = canonicalize("happy");
    assert_eq!(effective_difficulty(12.0, 0, emotion), Difficulty::Hard);

    // Same performance, distressed student: floor wins over the base signal.
    let emotion = canonicalize("frustrated");
    assert_eq!(effective_difficulty(12.0, 0, emotion), Difficulty::Easy);

    // Unknown label degrades to Neutral and the fuzzy base decides.
    let emotion = canonicalize("???");
    assert_eq!(emotion, EmotionLabel::Neutral);
    assert_eq!(effective_difficulty(12.0, 0, emotion), Difficulty::Hard);
}

#[test]
fn base_engine_anchor_points() {
    assert_eq!(decide_difficulty(10.0, 0), Difficulty::Hard);
    assert_eq!(
        effective_difficulty(200.0, 8, EmotionLabel::Neutral),
        Difficulty::Easy
    );
}

#[test]
fn override_thresholds_are_inclusive() {
    assert_eq!(
        effective_difficulty(59.9, 1, EmotionLabel::Neutral),
        decide_difficulty(59.9, 1)
    );
    assert_eq!(
        effective_difficulty(60.0, 0, EmotionLabel::Neutral),
        Difficulty::Easy
    );
    assert_eq!(
        effective_difficulty(10.0, 2, EmotionLabel::Neutral),
        Difficulty::Easy
    );
}

#[test]
fn distress_flag_from_raw_label_stream() {
    let raw = [
        "anxious", "sad", "confused", "angry", "fearful", "frustrated", "anxious", "sad",
        "confused", "angry", "fearful", "frustrated", "anxious", "neutral", "neutral", "happy",
        "neutral", "surprised", "neutral", "happy",
    ];
    let labels: Vec<EmotionLabel> = raw.iter().map(|r| canonicalize(r)).collect();
    assert_eq!(labels.len(), 20);
    // 13 of 20 negative: above the 60% threshold.
    assert!(has_sustained_distress(&labels));
}

#[test]
fn distress_boundary_cases() {
    assert!(!has_sustained_distress(&[]));

    let mut twelve_of_twenty = vec![EmotionLabel::Negative; 12];
    twelve_of_twenty.extend(vec![EmotionLabel::Neutral; 8]);
    assert!(!has_sustained_distress(&twelve_of_twenty));

    let mut thirteen_of_twenty = vec![EmotionLabel::Negative; 13];
    thirteen_of_twenty.extend(vec![EmotionLabel::Neutral; 7]);
    assert!(has_sustained_distress(&thirteen_of_twenty));
}
