//! Error-log entries and aggregated error patterns.
//!
//! An [`ErrorLogEntry`] is one detected mistake; an [`ErrorPattern`] is the
//! per-(learner, language) aggregate keyed by category + subcategory, carrying
//! frequency counters, a bounded ring of recent examples, and a trend label.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{EventId, LanguageCode, LearnerId, SessionId};

/// Maximum number of examples retained per pattern (FIFO eviction).
pub const MAX_PATTERN_EXAMPLES: usize = 10;

/// Category of a detected learner error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Grammar,
    Vocabulary,
    Pronunciation,
    Cultural,
    Pragmatic,
    Register,
}

impl ErrorCategory {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grammar => "grammar",
            Self::Vocabulary => "vocabulary",
            Self::Pronunciation => "pronunciation",
            Self::Cultural => "cultural",
            Self::Pragmatic => "pragmatic",
            Self::Register => "register",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of a pattern over the comparison window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    #[default]
    Stable,
    Worsening,
}

/// One detected error, appended to the durable error log.
///
/// `corrected` is the only mutable field; everything else is frozen at
/// detection time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub id: EventId,
    pub learner: LearnerId,
    pub language: LanguageCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionId>,
    pub category: ErrorCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    /// Free-text context (the utterance or fragment the error occurred in).
    pub context: String,
    pub corrected: bool,
    pub timestamp: DateTime<Utc>,
}

impl ErrorLogEntry {
    /// Create a new uncorrected entry stamped with the current time.
    #[must_use]
    pub fn new(
        learner: LearnerId,
        language: LanguageCode,
        category: ErrorCategory,
        context: impl Into<String>,
    ) -> Self {
        Self {
            id: EventId::new(),
            learner,
            language,
            session: None,
            category,
            subcategory: None,
            context: context.into(),
            corrected: false,
            timestamp: Utc::now(),
        }
    }

    /// Attach the session the error was detected in.
    #[must_use]
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    /// Refine the category with a subcategory (e.g. "verb_tense").
    #[must_use]
    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    /// Override the detection timestamp (events arrive with their own clocks).
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Key identifying a pattern within a learner's memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternKey {
    pub category: ErrorCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
}

impl PatternKey {
    #[must_use]
    pub fn new(category: ErrorCategory, subcategory: Option<String>) -> Self {
        Self {
            category,
            subcategory,
        }
    }

    /// Human-readable label ("grammar/verb_tense" or just "grammar").
    #[must_use]
    pub fn label(&self) -> String {
        match &self.subcategory {
            Some(sub) => format!("{}/{}", self.category, sub),
            None => self.category.to_string(),
        }
    }
}

/// A retained example of a pattern occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternExample {
    pub context: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregated, trend-annotated record of a recurring mistake category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub key: PatternKey,
    /// Cumulative occurrence count; monotonically non-decreasing.
    pub frequency: u64,
    /// Occurrences since the last completed session; reset exactly once per
    /// session completion.
    pub recent_count: u64,
    pub trend: Trend,
    /// Bounded ring of recent examples, oldest first.
    pub examples: Vec<PatternExample>,
    pub first_occurrence: DateTime<Utc>,
    pub last_occurrence: DateTime<Utc>,
}

impl ErrorPattern {
    /// Create a pattern from its first occurrence.
    #[must_use]
    pub fn first(key: PatternKey, context: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            key,
            frequency: 1,
            recent_count: 1,
            trend: Trend::Stable,
            examples: vec![PatternExample {
                context: context.into(),
                timestamp: at,
            }],
            first_occurrence: at,
            last_occurrence: at,
        }
    }

    /// Record another occurrence: bump both counters, push a bounded example,
    /// and move the last-occurrence marker forward.
    pub fn record(&mut self, context: impl Into<String>, at: DateTime<Utc>) {
        self.frequency += 1;
        self.recent_count += 1;
        self.examples.push(PatternExample {
            context: context.into(),
            timestamp: at,
        });
        if self.examples.len() > MAX_PATTERN_EXAMPLES {
            self.examples.remove(0);
        }
        if at > self.last_occurrence {
            self.last_occurrence = at;
        }
    }
}
