//! Four-dimension scoring engine
//!
//! Pure functions from an event batch + error log to Fluency / Accuracy /
//! Appropriacy / Confidence scores with component breakdowns and feedback.
//! Scorers never touch storage; the assessment service feeds them and
//! persists the result.

mod accuracy;
mod appropriacy;
mod confidence;
mod fluency;
mod heuristics;

pub use accuracy::{score_accuracy, AccuracyComponents, AccuracyScore};
pub use appropriacy::{score_appropriacy, AppropriacyComponents, AppropriacyScore};
pub use confidence::{score_confidence, ConfidenceComponents, ConfidenceScore};
pub use fluency::{score_fluency, FluencyComponents, FluencyScore};
pub use heuristics::{HeuristicPatterns, ScoringHeuristics};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use lingo_core::{ErrorLogEntry, EventKind, SessionEvent};

/// Overall weighting of the four dimensions.
pub const FLUENCY_WEIGHT: f64 = 0.25;
pub const ACCURACY_WEIGHT: f64 = 0.35;
pub const APPROPRIACY_WEIGHT: f64 = 0.20;
pub const CONFIDENCE_WEIGHT: f64 = 0.20;

/// One user utterance extracted from the event log.
#[derive(Debug, Clone)]
pub struct UserMessage {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl UserMessage {
    /// Whitespace-delimited word count.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Everything the scorers consume, extracted once from the raw batch.
#[derive(Debug, Clone)]
pub struct ScoreInput {
    pub messages: Vec<UserMessage>,
    pub duration: Duration,
    pub errors: Vec<ErrorLogEntry>,
    pub hints_requested: u32,
    pub activities_started: u32,
    pub activities_completed: u32,
    pub corrections_accepted: u32,
}

impl ScoreInput {
    /// Extract scoring input from an event batch and its error-log entries.
    ///
    /// Duration spans the first to the last event in the batch.
    #[must_use]
    pub fn from_events(events: &[SessionEvent], errors: &[ErrorLogEntry]) -> Self {
        let mut messages = Vec::new();
        let mut hints_requested = 0;
        let mut activities_started = 0;
        let mut activities_completed = 0;
        let mut corrections_accepted = 0;

        for event in events {
            match event.kind {
                EventKind::UserMessage => {
                    messages.push(UserMessage {
                        text: event.text().unwrap_or_default().to_string(),
                        timestamp: event.timestamp,
                    });
                }
                EventKind::HintRequested => hints_requested += 1,
                EventKind::ActivityStart => activities_started += 1,
                EventKind::ActivityComplete => activities_completed += 1,
                EventKind::CorrectionAccepted => corrections_accepted += 1,
                _ => {}
            }
        }

        let duration = match (events.first(), events.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => Duration::zero(),
        };

        Self {
            messages,
            duration,
            errors: errors.to_vec(),
            hints_requested,
            activities_started,
            activities_completed,
            corrections_accepted,
        }
    }

    /// Session duration in minutes, floored at one second to keep rates
    /// finite.
    #[must_use]
    pub fn minutes(&self) -> f64 {
        (self.duration.num_milliseconds() as f64 / 60_000.0).max(1.0 / 60.0)
    }

    /// Seconds between consecutive user messages.
    #[must_use]
    pub fn message_gaps(&self) -> Vec<f64> {
        self.messages
            .windows(2)
            .map(|w| (w[1].timestamp - w[0].timestamp).num_milliseconds() as f64 / 1000.0)
            .collect()
    }

    /// Total words across all user messages.
    #[must_use]
    pub fn total_words(&self) -> usize {
        self.messages.iter().map(UserMessage::word_count).sum()
    }
}

/// The combined result of all four scorers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub fluency: FluencyScore,
    pub accuracy: AccuracyScore,
    pub appropriacy: AppropriacyScore,
    pub confidence: ConfidenceScore,
    /// `fluency * 0.25 + accuracy * 0.35 + appropriacy * 0.20 +
    /// confidence * 0.20`
    pub overall: f64,
}

impl ScoreSet {
    /// Run all four scorers and combine them.
    #[must_use]
    pub fn compute(input: &ScoreInput, heuristics: &ScoringHeuristics) -> Self {
        let fluency = score_fluency(input, heuristics);
        let accuracy = score_accuracy(input);
        let appropriacy = score_appropriacy(input, heuristics);
        let confidence = score_confidence(input, heuristics);

        let overall = fluency.score * FLUENCY_WEIGHT
            + accuracy.score * ACCURACY_WEIGHT
            + appropriacy.score * APPROPRIACY_WEIGHT
            + confidence.score * CONFIDENCE_WEIGHT;

        Self {
            fluency,
            accuracy,
            appropriacy,
            confidence,
            overall,
        }
    }
}

/// Bin an errors-per-utterance rate into 8 tiers from 100 down to 30.
#[must_use]
pub(crate) fn rate_tier(rate: f64) -> f64 {
    match rate {
        r if r <= 0.0 => 100.0,
        r if r <= 0.05 => 90.0,
        r if r <= 0.10 => 80.0,
        r if r <= 0.15 => 70.0,
        r if r <= 0.20 => 60.0,
        r if r <= 0.30 => 50.0,
        r if r <= 0.40 => 40.0,
        _ => 30.0,
    }
}

/// Bin a recovery/correction ratio into tiers from 100 down to 20.
#[must_use]
pub(crate) fn ratio_tier(ratio: f64) -> f64 {
    match ratio {
        r if r >= 0.8 => 100.0,
        r if r >= 0.6 => 80.0,
        r if r >= 0.4 => 60.0,
        r if r >= 0.2 => 40.0,
        _ => 20.0,
    }
}

/// Pick the weakest component by value; ties resolve to the earliest entry,
/// making feedback deterministic.
pub(crate) fn weakest<'a>(components: &[(&'a str, f64)]) -> &'a str {
    let mut best = components[0];
    for &candidate in &components[1..] {
        if candidate.1 < best.1 {
            best = candidate;
        }
    }
    best.0
}
