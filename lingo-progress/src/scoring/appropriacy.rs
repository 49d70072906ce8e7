//! Appropriacy scorer
//!
//! Components, weighted equally at 25% each:
//! - register match: register errors per user message, tiered
//! - cultural awareness: cultural errors per user message, tiered
//! - pragmatic competence: pragmatic errors per user message, tiered
//! - politeness markers: fraction of messages carrying a politeness marker

use serde::{Deserialize, Serialize};

use lingo_core::ErrorCategory;

use super::accuracy::category_counts;
use super::heuristics::ScoringHeuristics;
use super::{rate_tier, weakest, ScoreInput};

/// Component breakdown for the appropriacy dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppropriacyComponents {
    pub register_match: f64,
    pub cultural_awareness: f64,
    pub pragmatic_competence: f64,
    pub politeness_markers: f64,
}

/// Appropriacy dimension result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppropriacyScore {
    pub score: f64,
    pub components: AppropriacyComponents,
    pub feedback: String,
}

/// Score the appropriacy dimension.
#[must_use]
pub fn score_appropriacy(input: &ScoreInput, heuristics: &ScoringHeuristics) -> AppropriacyScore {
    let message_count = input.messages.len().max(1) as f64;
    let counts = category_counts(&input.errors);
    let rate_for = |category: ErrorCategory| {
        counts.get(&category).copied().unwrap_or(0) as f64 / message_count
    };

    let register_match = rate_tier(rate_for(ErrorCategory::Register));
    let cultural_awareness = rate_tier(rate_for(ErrorCategory::Cultural));
    let pragmatic_competence = rate_tier(rate_for(ErrorCategory::Pragmatic));

    // One marker per four messages is already full marks; a session with no
    // messages has nothing to judge and sits at neutral.
    let politeness_markers = if input.messages.is_empty() {
        50.0
    } else {
        let marked = input
            .messages
            .iter()
            .filter(|m| heuristics.has_politeness_marker(&m.text))
            .count() as f64;
        let fraction = marked / input.messages.len() as f64;
        (30.0 + fraction / 0.25 * 70.0).min(100.0)
    };

    let components = AppropriacyComponents {
        register_match,
        cultural_awareness,
        pragmatic_competence,
        politeness_markers,
    };
    let score = (register_match + cultural_awareness + pragmatic_competence + politeness_markers)
        * 0.25;

    let feedback = feedback_for(&components);

    AppropriacyScore {
        score,
        components,
        feedback,
    }
}

fn feedback_for(components: &AppropriacyComponents) -> String {
    match weakest(&[
        ("register_match", components.register_match),
        ("cultural_awareness", components.cultural_awareness),
        ("pragmatic_competence", components.pragmatic_competence),
        ("politeness_markers", components.politeness_markers),
    ]) {
        "register_match" => "Your tone slipped between formal and casual; pick the register the \
                             scenario calls for and hold it."
            .to_string(),
        "cultural_awareness" => "Some phrasings missed cultural conventions; noting how native \
                                 speakers handle these situations will help."
            .to_string(),
        "pragmatic_competence" => "Your intent sometimes came across differently than you meant; \
                                   watch how requests and refusals are softened."
            .to_string(),
        _ => format!(
            "Only {:.0} of 100 on politeness markers; sprinkling in 'please', 'could you', and \
             their equivalents goes a long way.",
            components.politeness_markers
        ),
    }
}
