//! lingo-core: session substrate for the lingo learner-progress engine
//!
//! This crate provides the foundational components:
//!
//! - **Event log** - [`SessionEvent`] / [`EventKind`], the append-only
//!   substrate everything else reads
//! - **Session state machine** - [`Session`], [`SessionStatus`], and the
//!   per-session [`SessionMetrics`] frozen at completion
//! - **Session management** - [`SessionManager`] enforcing the
//!   at-most-one-active-session invariant and the terminal-append guard
//! - **Learner memory** - [`LearnerMemory`], the versioned per-(learner,
//!   language) document shared across sessions
//! - **Storage traits** - [`ProgressStore`] and [`CacheStore`], plus
//!   in-memory implementations for tests and default wiring
//!
//! Scoring, error-pattern trends, and progression live in `lingo-progress`.

pub mod error;
pub mod events;
pub mod session;
pub mod store;
pub mod types;

// Re-export key types for convenience
pub use error::{LingoError, SessionError, StoreError, ValidationError};
pub use events::{EventKind, SessionEvent};
pub use session::{Session, SessionManager, SessionMetrics, SessionStatus};
pub use store::{CacheStore, MemoryCacheStore, MemoryProgressStore, ProgressStore};
pub use types::{
    AssessmentId, CefrLevel, ErrorCategory, ErrorLogEntry, ErrorPattern, EventId, LanguageCode,
    LearnerId, LearnerMemory, ModuleId, PatternExample, PatternKey, Preferences, ProgressData,
    ScenarioId, SessionId, Trend, MAX_PATTERN_EXAMPLES,
};
