//! Per-session summary metrics
//!
//! A quick, cheap summary computed once at completion as a pure function of
//! the event log. Deliberate assessment scoring (the four-dimension engine)
//! lives in lingo-progress; this is the lightweight per-session counterpart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{EventKind, SessionEvent};

/// Frozen summary of a completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub duration_secs: i64,
    pub user_messages: u32,
    pub agent_messages: u32,
    pub errors_detected: u32,
    pub corrections_given: u32,
    pub corrections_accepted: u32,
    pub hints_requested: u32,
    pub activities_completed: u32,
    /// Message rate, adjusted down for hint requests and up for completed
    /// activities (0-100).
    pub engagement: f64,
    /// Derived from the error-to-message ratio (0-100).
    pub accuracy: f64,
    /// Derived from the regularity of inter-user-message gaps (0-100).
    pub fluency: f64,
    /// Mean of the three sub-scores.
    pub overall_score: f64,
}

impl SessionMetrics {
    /// Compute metrics from an event log.
    #[must_use]
    pub fn compute(
        events: &[SessionEvent],
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let mut user_messages = 0u32;
        let mut agent_messages = 0u32;
        let mut errors_detected = 0u32;
        let mut corrections_given = 0u32;
        let mut corrections_accepted = 0u32;
        let mut hints_requested = 0u32;
        let mut activities_completed = 0u32;
        let mut user_message_times = Vec::new();

        for event in events {
            match event.kind {
                EventKind::UserMessage => {
                    user_messages += 1;
                    user_message_times.push(event.timestamp);
                }
                EventKind::AgentMessage => agent_messages += 1,
                EventKind::ErrorDetected => errors_detected += 1,
                EventKind::CorrectionGiven => corrections_given += 1,
                EventKind::CorrectionAccepted => corrections_accepted += 1,
                EventKind::HintRequested => hints_requested += 1,
                EventKind::ActivityComplete => activities_completed += 1,
                _ => {}
            }
        }

        let duration_secs = (completed_at - started_at).num_seconds().max(0);

        let (engagement, accuracy, fluency) = if user_messages == 0 {
            (0.0, 0.0, 0.0)
        } else {
            let minutes = (duration_secs as f64 / 60.0).max(1.0 / 60.0);
            let rate = f64::from(user_messages) / minutes;
            // 4 messages/minute reaches the full base score
            let base = (rate / 4.0 * 100.0).min(100.0);
            let engagement = (base - 5.0 * f64::from(hints_requested)
                + 10.0 * f64::from(activities_completed))
            .clamp(0.0, 100.0);

            let error_ratio = f64::from(errors_detected) / f64::from(user_messages);
            let accuracy = (100.0 * (1.0 - error_ratio)).clamp(0.0, 100.0);

            let fluency = gap_regularity_score(&user_message_times);

            (engagement, accuracy, fluency)
        };

        let overall_score = (engagement + accuracy + fluency) / 3.0;

        Self {
            duration_secs,
            user_messages,
            agent_messages,
            errors_detected,
            corrections_given,
            corrections_accepted,
            hints_requested,
            activities_completed,
            engagement,
            accuracy,
            fluency,
            overall_score,
        }
    }
}

/// Score the regularity of inter-message gaps via their coefficient of
/// variation; evenly paced turns score high, bursty ones low. Fewer than
/// three messages is not enough signal, so the score is neutral.
fn gap_regularity_score(times: &[DateTime<Utc>]) -> f64 {
    if times.len() < 3 {
        return 50.0;
    }
    let gaps: Vec<f64> = times
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / 1000.0)
        .collect();
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    if mean <= 0.0 {
        return 50.0;
    }
    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
    let cv = variance.sqrt() / mean;
    (100.0 * (1.0 - cv.min(1.0))).clamp(0.0, 100.0)
}
