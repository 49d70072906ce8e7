//! Fluency scorer
//!
//! Components and weights:
//! - speaking pace (25%): messages/minute, peak band 3-6, degrading outward
//! - hesitation (25%): fraction of inter-message gaps longer than 10s
//! - filler words (20%): filler matches per word, lower is better
//! - natural flow (30%): coefficient of variation of inter-message gaps

use serde::{Deserialize, Serialize};

use super::heuristics::ScoringHeuristics;
use super::{weakest, ScoreInput};

/// Gap length that counts as a hesitation.
const HESITATION_GAP_SECS: f64 = 10.0;

/// Component breakdown for the fluency dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluencyComponents {
    pub speaking_pace: f64,
    pub hesitation: f64,
    pub filler_words: f64,
    pub natural_flow: f64,
}

/// Fluency dimension result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluencyScore {
    pub score: f64,
    pub components: FluencyComponents,
    pub feedback: String,
}

/// Score the fluency dimension.
#[must_use]
pub fn score_fluency(input: &ScoreInput, heuristics: &ScoringHeuristics) -> FluencyScore {
    let pace_per_min = input.messages.len() as f64 / input.minutes();
    let speaking_pace = pace_score(pace_per_min);

    let gaps = input.message_gaps();
    let long_gap_fraction = if gaps.is_empty() {
        0.0
    } else {
        gaps.iter().filter(|g| **g > HESITATION_GAP_SECS).count() as f64 / gaps.len() as f64
    };
    let hesitation = if input.messages.len() < 2 {
        50.0
    } else {
        100.0 * (1.0 - long_gap_fraction)
    };

    let total_words = input.total_words();
    let filler_matches: usize = input
        .messages
        .iter()
        .map(|m| heuristics.filler_count(&m.text))
        .sum();
    let filler_ratio = if total_words == 0 {
        0.0
    } else {
        filler_matches as f64 / total_words as f64
    };
    let filler_words = (100.0 - filler_ratio * 500.0).clamp(0.0, 100.0);

    let natural_flow = flow_score(&gaps);

    let components = FluencyComponents {
        speaking_pace,
        hesitation,
        filler_words,
        natural_flow,
    };
    let score = speaking_pace * 0.25 + hesitation * 0.25 + filler_words * 0.20 + natural_flow * 0.30;

    let feedback = feedback_for(&components, pace_per_min, long_gap_fraction, filler_ratio);

    FluencyScore {
        score,
        components,
        feedback,
    }
}

/// Peak score inside 3-6 messages/minute, degrading linearly outward.
fn pace_score(pace: f64) -> f64 {
    if (3.0..=6.0).contains(&pace) {
        100.0
    } else if pace < 3.0 {
        (100.0 * pace / 3.0).clamp(0.0, 100.0)
    } else {
        (100.0 - (pace - 6.0) * 10.0).clamp(30.0, 100.0)
    }
}

/// Low variance in gap lengths reads as natural rhythm.
fn flow_score(gaps: &[f64]) -> f64 {
    if gaps.len() < 2 {
        return 50.0;
    }
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    if mean <= 0.0 {
        return 50.0;
    }
    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
    let cv = variance.sqrt() / mean;
    (100.0 * (1.0 - cv.min(1.0))).clamp(0.0, 100.0)
}

fn feedback_for(
    components: &FluencyComponents,
    pace: f64,
    long_gap_fraction: f64,
    filler_ratio: f64,
) -> String {
    match weakest(&[
        ("speaking_pace", components.speaking_pace),
        ("hesitation", components.hesitation),
        ("filler_words", components.filler_words),
        ("natural_flow", components.natural_flow),
    ]) {
        "speaking_pace" => format!(
            "Your pace of {pace:.1} messages per minute is outside the comfortable 3-6 band; \
             aim for steadier, conversational turns."
        ),
        "hesitation" => format!(
            "{:.0}% of your pauses ran longer than 10 seconds; try answering before the \
             sentence is fully formed in your head.",
            long_gap_fraction * 100.0
        ),
        "filler_words" => format!(
            "Filler words made up {:.0}% of your output; a silent pause reads as more fluent \
             than 'um' or 'like'.",
            filler_ratio * 100.0
        ),
        _ => "Your rhythm varied a lot between turns; keeping a steadier cadence will sound \
              more natural."
            .to_string(),
    }
}
