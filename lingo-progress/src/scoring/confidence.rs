//! Confidence scorer
//!
//! Components and weights:
//! - risk taking (25%): message length plus complexity-connective usage
//! - self correction (30%): corrections accepted relative to errors made
//! - persistence (25%): activity completion rate, discounted per hint
//! - complexity attempts (20%): advanced-grammar markers per message

use serde::{Deserialize, Serialize};

use super::heuristics::ScoringHeuristics;
use super::{ratio_tier, weakest, ScoreInput};

/// Component breakdown for the confidence dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceComponents {
    pub risk_taking: f64,
    pub self_correction: f64,
    pub persistence: f64,
    pub complexity_attempts: f64,
}

/// Confidence dimension result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub score: f64,
    pub components: ConfidenceComponents,
    pub feedback: String,
}

/// Score the confidence dimension.
#[must_use]
pub fn score_confidence(input: &ScoreInput, heuristics: &ScoringHeuristics) -> ConfidenceScore {
    let message_count = input.messages.len();

    let risk_taking = if message_count == 0 {
        50.0
    } else {
        let avg_words = input.total_words() as f64 / message_count as f64;
        let connectives: usize = input
            .messages
            .iter()
            .map(|m| heuristics.connective_count(&m.text))
            .sum();
        let connectives_per_message = connectives as f64 / message_count as f64;
        0.7 * (avg_words * 8.0).min(100.0) + 0.3 * (connectives_per_message * 200.0).min(100.0)
    };

    let self_correction = if input.errors.is_empty() {
        100.0
    } else {
        ratio_tier(input.corrections_accepted as f64 / input.errors.len() as f64)
    };

    let persistence = if input.activities_started == 0 {
        70.0
    } else {
        let completion = input.activities_completed as f64 / input.activities_started as f64;
        (100.0 * completion - 5.0 * input.hints_requested as f64).clamp(0.0, 100.0)
    };

    let complexity_attempts = if message_count == 0 {
        50.0
    } else {
        let advanced: usize = input
            .messages
            .iter()
            .map(|m| heuristics.advanced_grammar_count(&m.text))
            .sum();
        (advanced as f64 / message_count as f64 * 250.0).min(100.0)
    };

    let components = ConfidenceComponents {
        risk_taking,
        self_correction,
        persistence,
        complexity_attempts,
    };
    let score = risk_taking * 0.25
        + self_correction * 0.30
        + persistence * 0.25
        + complexity_attempts * 0.20;

    let feedback = feedback_for(&components, input);

    ConfidenceScore {
        score,
        components,
        feedback,
    }
}

fn feedback_for(components: &ConfidenceComponents, input: &ScoreInput) -> String {
    match weakest(&[
        ("risk_taking", components.risk_taking),
        ("self_correction", components.self_correction),
        ("persistence", components.persistence),
        ("complexity_attempts", components.complexity_attempts),
    ]) {
        "risk_taking" => "Your messages stayed short and simple; stretching into longer, linked \
                          sentences builds confidence fastest."
            .to_string(),
        "self_correction" => format!(
            "You accepted {} of {} offered corrections; taking them on and retrying is where \
             the learning happens.",
            input.corrections_accepted,
            input.errors.len()
        ),
        "persistence" => format!(
            "You completed {} of {} activities you started; finishing what you begin, even \
             imperfectly, counts for more than hints.",
            input.activities_completed, input.activities_started
        ),
        _ => "You mostly stuck to familiar grammar; trying a conditional or a perfect tense \
              now and then pays off."
            .to_string(),
    }
}
