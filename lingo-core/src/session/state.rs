//! Session record and lifecycle state machine
//!
//! A session is an append-only event log plus a status. Status governs which
//! operations are legal:
//! - events append only while ACTIVE or PAUSED
//! - pause/resume toggle between ACTIVE and PAUSED
//! - complete freezes metrics and is idempotent on COMPLETED
//! - abandon is a no-op on any terminal status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::events::{EventKind, SessionEvent};
use crate::types::{LanguageCode, LearnerId, ScenarioId, SessionId};

use super::metrics::SessionMetrics;

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting events (initial status)
    Active,
    /// Temporarily suspended; still accepts events
    Paused,
    /// Ended normally; metrics frozen (terminal)
    Completed,
    /// Ended by timeout or sweep (terminal)
    Abandoned,
}

impl SessionStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One continuous practice interaction between a learner and the tutoring
/// agent.
///
/// Owned exclusively by the learner who started it; mutated only through the
/// state-machine operations below; never destroyed, only appended to or
/// status-transitioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub learner: LearnerId,
    pub language: LanguageCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<ScenarioId>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Append-only, timestamp-non-decreasing event log.
    pub events: Vec<SessionEvent>,
    /// Frozen at completion; `None` until then.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<SessionMetrics>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Session {
    /// Start a new session. The log opens with a session_start event.
    #[must_use]
    pub fn new(learner: LearnerId, language: LanguageCode, scenario: Option<ScenarioId>) -> Self {
        let started_at = Utc::now();
        Self {
            id: SessionId::new(),
            learner,
            language,
            scenario,
            status: SessionStatus::Active,
            started_at,
            completed_at: None,
            events: vec![SessionEvent::new(EventKind::SessionStart).at(started_at)],
            metrics: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Timestamp of the most recent event, falling back to session start.
    #[must_use]
    pub fn last_event_at(&self) -> DateTime<Utc> {
        self.events
            .last()
            .map_or(self.started_at, |e| e.timestamp)
    }

    /// Append an event to the log.
    ///
    /// Legal only while ACTIVE or PAUSED. Timestamps are clamped so the log
    /// stays non-decreasing even when events arrive with skewed clocks.
    pub fn append(&mut self, mut event: SessionEvent) -> Result<(), SessionError> {
        if self.status.is_terminal() {
            return Err(SessionError::Terminal {
                id: self.id,
                status: self.status,
            });
        }
        let floor = self.last_event_at();
        if event.timestamp < floor {
            event.timestamp = floor;
        }
        self.events.push(event);
        Ok(())
    }

    /// ACTIVE → PAUSED, appending a synthetic pause event.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.status != SessionStatus::Active {
            return Err(SessionError::InvalidState {
                expected: SessionStatus::Active.to_string(),
                actual: self.status.to_string(),
            });
        }
        self.append(SessionEvent::new(EventKind::Pause))?;
        self.status = SessionStatus::Paused;
        Ok(())
    }

    /// PAUSED → ACTIVE, appending a synthetic resume event.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.status != SessionStatus::Paused {
            return Err(SessionError::InvalidState {
                expected: SessionStatus::Paused.to_string(),
                actual: self.status.to_string(),
            });
        }
        self.append(SessionEvent::new(EventKind::Resume))?;
        self.status = SessionStatus::Active;
        Ok(())
    }

    /// ACTIVE|PAUSED → COMPLETED: append session_end, compute and freeze
    /// metrics.
    ///
    /// Idempotent on an already-COMPLETED session: returns the frozen metrics
    /// without touching the log. Completing an ABANDONED session is an
    /// invalid-state error.
    pub fn complete(&mut self) -> Result<SessionMetrics, SessionError> {
        match self.status {
            SessionStatus::Completed => {
                // Frozen metrics are always present on a completed session
                return self
                    .metrics
                    .clone()
                    .ok_or_else(|| SessionError::InvalidState {
                        expected: "completed session with metrics".to_string(),
                        actual: "completed session without metrics".to_string(),
                    });
            }
            SessionStatus::Abandoned => {
                return Err(SessionError::InvalidState {
                    expected: "active or paused".to_string(),
                    actual: self.status.to_string(),
                });
            }
            SessionStatus::Active | SessionStatus::Paused => {}
        }

        let completed_at = Utc::now().max(self.last_event_at());
        self.append(SessionEvent::new(EventKind::SessionEnd).at(completed_at))?;
        let metrics = SessionMetrics::compute(&self.events, self.started_at, completed_at);
        self.metrics = Some(metrics.clone());
        self.completed_at = Some(completed_at);
        self.status = SessionStatus::Completed;
        Ok(metrics)
    }

    /// ACTIVE|PAUSED → ABANDONED. No-op on any terminal status.
    pub fn abandon(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.completed_at = Some(Utc::now());
        self.status = SessionStatus::Abandoned;
    }
}
