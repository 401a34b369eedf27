use serde::{Deserialize, Serialize};

use crate::services::emotion::EmotionLabel;

/// Quiz difficulty surfaced to the question generator and the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    fn weight(self) -> f64 {
        match self {
            Self::Easy => 1.0,
            Self::Medium => 2.0,
            Self::Hard => 3.0,
        }
    }

    fn from_level(level: i32) -> Self {
        match level {
            i32::MIN..=1 => Self::Easy,
            2 => Self::Medium,
            _ => Self::Hard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "EASY",
            Self::Medium => "MEDIUM",
            Self::Hard => "HARD",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const MAX_DURATION_SECS: f64 = 300.0;
const MAX_WRONG_COUNT: u32 = 10;

// Struggle override thresholds. Unambiguous distress pins the session to
// EASY no matter what the fuzzy base says.
const OVERRIDE_WRONG_COUNT: u32 = 2;
const OVERRIDE_DURATION_SECS: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DurationTerm {
    Fast,
    Normal,
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WrongTerm {
    Low,
    Medium,
    High,
}

/// Rule base, min-conjunction over the antecedent pair. `None` matches any
/// value of that input. Rules are data so they stay auditable one by one.
const RULES: &[(Option<DurationTerm>, Option<WrongTerm>, Difficulty)] = &[
    (Some(DurationTerm::Fast), Some(WrongTerm::Low), Difficulty::Hard),
    (Some(DurationTerm::Normal), Some(WrongTerm::Low), Difficulty::Medium),
    (Some(DurationTerm::Fast), Some(WrongTerm::Medium), Difficulty::Medium),
    (None, Some(WrongTerm::High), Difficulty::Easy),
    (Some(DurationTerm::Slow), None, Difficulty::Easy),
    (Some(DurationTerm::Normal), Some(WrongTerm::Medium), Difficulty::Medium),
];

fn ramp_down(x: f64, full_until: f64, zero_at: f64) -> f64 {
    if x <= full_until {
        1.0
    } else if x >= zero_at {
        0.0
    } else {
        (zero_at - x) / (zero_at - full_until)
    }
}

fn ramp_up(x: f64, zero_until: f64, full_at: f64) -> f64 {
    if x <= zero_until {
        0.0
    } else if x >= full_at {
        1.0
    } else {
        (x - zero_until) / (full_at - zero_until)
    }
}

fn triangle(x: f64, left: f64, peak: f64, right: f64) -> f64 {
    if x <= left || x >= right {
        0.0
    } else if x <= peak {
        (x - left) / (peak - left)
    } else {
        (right - x) / (right - peak)
    }
}

fn duration_membership(term: DurationTerm, secs: f64) -> f64 {
    match term {
        DurationTerm::Fast => ramp_down(secs, 20.0, 60.0),
        DurationTerm::Normal => triangle(secs, 10.0, 40.0, 90.0),
        DurationTerm::Slow => ramp_up(secs, 60.0, 150.0),
    }
}

fn wrong_membership(term: WrongTerm, count: f64) -> f64 {
    match term {
        WrongTerm::Low => ramp_down(count, 0.0, 2.0),
        WrongTerm::Medium => triangle(count, 0.0, 2.0, 5.0),
        WrongTerm::High => ramp_up(count, 3.0, 6.0),
    }
}

/// Fuzzy base decision from the two continuous struggle proxies. Pure and
/// total: out-of-range inputs are clamped, never rejected.
pub fn decide_difficulty(duration_seconds: f64, wrong_count: u32) -> Difficulty {
    let secs = if duration_seconds.is_finite() {
        duration_seconds.clamp(0.0, MAX_DURATION_SECS)
    } else {
        0.0
    };
    let wrong = f64::from(wrong_count.min(MAX_WRONG_COUNT));

    let mut weighted = 0.0;
    let mut mass = 0.0;
    for (dur_term, wrong_term, consequent) in RULES {
        let dur_truth = dur_term.map_or(1.0, |t| duration_membership(t, secs));
        let wrong_truth = wrong_term.map_or(1.0, |t| wrong_membership(t, wrong));
        let truth = dur_truth.min(wrong_truth);
        weighted += truth * consequent.weight();
        mass += truth;
    }

    if mass <= f64::EPSILON {
        return Difficulty::Medium;
    }

    // Weighted mean over {1,2,3}; exact .5 rounds down so ties favor the
    // easier level.
    let score = weighted / mass;
    let level = (score - 0.5).ceil() as i32;
    Difficulty::from_level(level.clamp(1, 3))
}

/// Base decision plus the discrete safety layer: strong distress signals
/// force EASY, an unambiguous positive state with no distress forces HARD.
pub fn effective_difficulty(
    duration_seconds: f64,
    wrong_count: u32,
    emotion: EmotionLabel,
) -> Difficulty {
    if wrong_count >= OVERRIDE_WRONG_COUNT
        || duration_seconds >= OVERRIDE_DURATION_SECS
        || emotion == EmotionLabel::Negative
    {
        return Difficulty::Easy;
    }
    if emotion == EmotionLabel::Positive {
        return Difficulty::Hard;
    }
    decide_difficulty(duration_seconds, wrong_count)
}
