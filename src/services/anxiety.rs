use crate::services::emotion::EmotionLabel;

// Unweighted window: recency decides membership, never weight.
const WINDOW_SIZE: usize = 20;
const DISTRESS_NUMERATOR: usize = 3;
const DISTRESS_DENOMINATOR: usize = 5;

/// Sustained-distress signal over a most-recent-first label sequence.
/// True iff more than 60% of the considered window is Negative.
/// Empty input carries no evidence and never flags.
pub fn has_sustained_distress(recent: &[EmotionLabel]) -> bool {
    let window = &recent[..recent.len().min(WINDOW_SIZE)];
    if window.is_empty() {
        return false;
    }

    let negatives = window
        .iter()
        .filter(|label| **label == EmotionLabel::Negative)
        .count();

    // Integer compare keeps the 12/20 boundary exact.
    negatives * DISTRESS_DENOMINATOR > window.len() * DISTRESS_NUMERATOR
}
