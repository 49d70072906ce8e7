//! Storage traits for the learner-progress engine
//!
//! The durable store and the fast-path cache are external collaborators; the
//! core only ever talks to them through these object-safe traits. The cache
//! is advisory: correctness never depends on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::session::Session;
use crate::types::{
    ErrorLogEntry, EventId, LanguageCode, LearnerId, LearnerMemory, SessionId,
};

/// Durable storage for sessions, error logs, and learner memory.
///
/// Implementations must support atomic read-modify-write on the learner
/// memory document: [`save_memory`](ProgressStore::save_memory) is a
/// compare-and-swap keyed on the document's version counter.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Insert or replace a session record.
    async fn save_session(&self, session: &Session) -> Result<(), StoreError>;

    /// Retrieve a session by ID.
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StoreError>;

    /// Find the learner's ACTIVE session for a language, if any.
    async fn find_active_session(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
    ) -> Result<Option<Session>, StoreError>;

    /// All sessions for a (learner, language) pair, newest first.
    async fn list_sessions(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
    ) -> Result<Vec<Session>, StoreError>;

    /// All non-terminal sessions across learners (for the abandon sweep).
    async fn list_open_sessions(&self) -> Result<Vec<Session>, StoreError>;

    /// Append an error-log entry.
    async fn save_error_log(&self, entry: &ErrorLogEntry) -> Result<(), StoreError>;

    /// Error-log entries for a (learner, language) pair, optionally bounded
    /// to a time window, oldest first.
    async fn list_error_logs(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ErrorLogEntry>, StoreError>;

    /// Error-log entries recorded against one session, oldest first.
    async fn session_error_logs(
        &self,
        session: SessionId,
    ) -> Result<Vec<ErrorLogEntry>, StoreError>;

    /// Flip the `corrected` flag on an entry. Returns false if unknown.
    async fn mark_error_corrected(&self, id: EventId) -> Result<bool, StoreError>;

    /// Retrieve the learner-memory document for a (learner, language) pair.
    async fn get_memory(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
    ) -> Result<Option<LearnerMemory>, StoreError>;

    /// Compare-and-swap save of a learner-memory document.
    ///
    /// Succeeds only when `memory.version` matches the stored version (0 for
    /// a new document); the stored copy gets `version + 1`, which is
    /// returned. A mismatch yields [`StoreError::Conflict`] and the caller
    /// decides whether to re-read and retry.
    async fn save_memory(&self, memory: &LearnerMemory) -> Result<u64, StoreError>;
}

/// Fast-path cache: key to JSON blob with a TTL.
///
/// Optional and never load-bearing: a miss or a stale/garbled entry only
/// costs a store round-trip.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: std::time::Duration,
    ) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify traits are object-safe
    #[test]
    fn progress_store_is_object_safe() {
        fn _takes_boxed(_: Box<dyn ProgressStore>) {}
    }

    #[test]
    fn cache_store_is_object_safe() {
        fn _takes_boxed(_: Box<dyn CacheStore>) {}
    }
}
