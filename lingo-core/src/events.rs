//! Event type definitions
//!
//! A session's history is an append-only, ordered sequence of typed,
//! timestamped events. Events are immutable once appended; everything
//! downstream (metrics, scoring, patterns) is a pure function of this log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::EventId;

/// The fixed vocabulary of session events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionStart,
    SessionEnd,
    UserMessage,
    AgentMessage,
    ErrorDetected,
    CorrectionGiven,
    CorrectionAccepted,
    HintRequested,
    HintGiven,
    ScenarioStart,
    ScenarioComplete,
    ActivityStart,
    ActivityComplete,
    Pause,
    Resume,
    FeedbackGiven,
}

impl EventKind {
    /// Convert to database/JSON string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStart => "session_start",
            Self::SessionEnd => "session_end",
            Self::UserMessage => "user_message",
            Self::AgentMessage => "agent_message",
            Self::ErrorDetected => "error_detected",
            Self::CorrectionGiven => "correction_given",
            Self::CorrectionAccepted => "correction_accepted",
            Self::HintRequested => "hint_requested",
            Self::HintGiven => "hint_given",
            Self::ScenarioStart => "scenario_start",
            Self::ScenarioComplete => "scenario_complete",
            Self::ActivityStart => "activity_start",
            Self::ActivityComplete => "activity_complete",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::FeedbackGiven => "feedback_given",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable, timestamped fact appended to a session's log.
///
/// The payload is free-form JSON; well-known fields (`text` for messages) get
/// typed accessors, everything else is passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: EventId,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl SessionEvent {
    /// Create an event stamped with the current time and an empty payload.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: EventId::new(),
            kind,
            timestamp: Utc::now(),
            payload: serde_json::Value::Null,
        }
    }

    /// Create an event carrying a payload.
    #[must_use]
    pub fn with_payload(kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            payload,
            ..Self::new(kind)
        }
    }

    /// Create a user/agent message event.
    #[must_use]
    pub fn message(kind: EventKind, text: impl Into<String>) -> Self {
        Self::with_payload(kind, serde_json::json!({ "text": text.into() }))
    }

    /// Override the timestamp (events arrive from the transport with their
    /// own clocks).
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Message text, if the payload carries one.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.payload.get("text").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_serializes_to_snake_case() {
        let json = serde_json::to_string(&EventKind::UserMessage).unwrap();
        assert_eq!(json, "\"user_message\"");
        let json = serde_json::to_string(&EventKind::CorrectionAccepted).unwrap();
        assert_eq!(json, "\"correction_accepted\"");
    }

    #[test]
    fn event_kind_as_str_matches_serde() {
        for kind in [
            EventKind::SessionStart,
            EventKind::SessionEnd,
            EventKind::UserMessage,
            EventKind::AgentMessage,
            EventKind::ErrorDetected,
            EventKind::CorrectionGiven,
            EventKind::CorrectionAccepted,
            EventKind::HintRequested,
            EventKind::HintGiven,
            EventKind::ScenarioStart,
            EventKind::ScenarioComplete,
            EventKind::ActivityStart,
            EventKind::ActivityComplete,
            EventKind::Pause,
            EventKind::Resume,
            EventKind::FeedbackGiven,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn message_event_exposes_text() {
        let event = SessionEvent::message(EventKind::UserMessage, "hola, como estas?");
        assert_eq!(event.text(), Some("hola, como estas?"));
        assert_eq!(event.kind, EventKind::UserMessage);
    }

    #[test]
    fn non_message_event_has_no_text() {
        let event = SessionEvent::new(EventKind::Pause);
        assert_eq!(event.text(), None);
    }

    #[test]
    fn at_overrides_timestamp() {
        let ts = Utc::now() - chrono::Duration::minutes(5);
        let event = SessionEvent::new(EventKind::HintRequested).at(ts);
        assert_eq!(event.timestamp, ts);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = SessionEvent::with_payload(
            EventKind::ErrorDetected,
            serde_json::json!({ "category": "grammar", "context": "yo es" }),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"error_detected\""));

        let parsed: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, event.id);
        assert_eq!(parsed.kind, EventKind::ErrorDetected);
        assert_eq!(parsed.payload["category"], "grammar");
    }
}
