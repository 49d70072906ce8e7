//! Accuracy scorer
//!
//! Components and weights:
//! - grammar accuracy (35%): grammar errors per user message, tiered
//! - vocabulary accuracy (25%): vocabulary errors per user message, tiered
//! - pronunciation accuracy (25%): pronunciation errors per message, tiered
//! - error recovery (15%): fraction of logged errors later corrected

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use lingo_core::{ErrorCategory, ErrorLogEntry};

use super::{rate_tier, ratio_tier, weakest, ScoreInput};

/// Component breakdown for the accuracy dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyComponents {
    pub grammar_accuracy: f64,
    pub vocabulary_accuracy: f64,
    pub pronunciation_accuracy: f64,
    pub error_recovery: f64,
}

/// Accuracy dimension result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyScore {
    pub score: f64,
    pub components: AccuracyComponents,
    /// Errors grouped by category, for downstream recommendation use.
    #[serde(default)]
    pub error_counts: HashMap<ErrorCategory, usize>,
    pub feedback: String,
}

/// Errors grouped by category, shared with the recommender.
#[must_use]
pub(crate) fn category_counts(errors: &[ErrorLogEntry]) -> HashMap<ErrorCategory, usize> {
    let mut counts = HashMap::new();
    for entry in errors {
        *counts.entry(entry.category).or_insert(0) += 1;
    }
    counts
}

/// Score the accuracy dimension.
#[must_use]
pub fn score_accuracy(input: &ScoreInput) -> AccuracyScore {
    let message_count = input.messages.len().max(1) as f64;
    let counts = category_counts(&input.errors);
    let rate_for = |category: ErrorCategory| {
        counts.get(&category).copied().unwrap_or(0) as f64 / message_count
    };

    let grammar_accuracy = rate_tier(rate_for(ErrorCategory::Grammar));
    let vocabulary_accuracy = rate_tier(rate_for(ErrorCategory::Vocabulary));
    let pronunciation_accuracy = rate_tier(rate_for(ErrorCategory::Pronunciation));

    let error_recovery = if input.errors.is_empty() {
        100.0
    } else {
        let corrected = input.errors.iter().filter(|e| e.corrected).count() as f64;
        ratio_tier(corrected / input.errors.len() as f64)
    };

    let components = AccuracyComponents {
        grammar_accuracy,
        vocabulary_accuracy,
        pronunciation_accuracy,
        error_recovery,
    };
    let score = grammar_accuracy * 0.35
        + vocabulary_accuracy * 0.25
        + pronunciation_accuracy * 0.25
        + error_recovery * 0.15;

    let feedback = feedback_for(&components, &counts, input.errors.len());

    AccuracyScore {
        score,
        components,
        error_counts: counts,
        feedback,
    }
}

fn feedback_for(
    components: &AccuracyComponents,
    counts: &HashMap<ErrorCategory, usize>,
    total_errors: usize,
) -> String {
    let count_of = |category: ErrorCategory| counts.get(&category).copied().unwrap_or(0);
    match weakest(&[
        ("grammar_accuracy", components.grammar_accuracy),
        ("vocabulary_accuracy", components.vocabulary_accuracy),
        ("pronunciation_accuracy", components.pronunciation_accuracy),
        ("error_recovery", components.error_recovery),
    ]) {
        "grammar_accuracy" => format!(
            "Grammar is your biggest accuracy drag ({} errors this session); \
             slow down on verb endings and agreement.",
            count_of(ErrorCategory::Grammar)
        ),
        "vocabulary_accuracy" => format!(
            "Word choice tripped you up {} times; reviewing the session's \
             vocabulary before the next one will help.",
            count_of(ErrorCategory::Vocabulary)
        ),
        "pronunciation_accuracy" => format!(
            "Pronunciation caused {} errors; shadowing the corrected forms \
             aloud is the fastest fix.",
            count_of(ErrorCategory::Pronunciation)
        ),
        _ => format!(
            "Few of your {total_errors} errors were corrected in-session; \
             accepting and repeating corrections cements them."
        ),
    }
}
