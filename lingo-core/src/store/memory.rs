//! In-memory store implementations
//!
//! Used by tests and as the default wiring when no external store is
//! configured. The memory store honors the same compare-and-swap contract as
//! a real document store.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::session::{Session, SessionStatus};
use crate::types::{
    ErrorLogEntry, EventId, LanguageCode, LearnerId, LearnerMemory, SessionId,
};

use super::traits::{CacheStore, ProgressStore};

/// In-memory [`ProgressStore`].
#[derive(Default)]
pub struct MemoryProgressStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
    error_logs: RwLock<Vec<ErrorLogEntry>>,
    memories: RwLock<HashMap<(LearnerId, LanguageCode), LearnerMemory>>,
}

impl MemoryProgressStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn find_active_session(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
    ) -> Result<Option<Session>, StoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| {
                s.status == SessionStatus::Active
                    && &s.learner == learner
                    && &s.language == language
            })
            .cloned())
    }

    async fn list_sessions(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
    ) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| &s.learner == learner && &s.language == language)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }

    async fn list_open_sessions(&self) -> Result<Vec<Session>, StoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| !s.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn save_error_log(&self, entry: &ErrorLogEntry) -> Result<(), StoreError> {
        self.error_logs.write().await.push(entry.clone());
        Ok(())
    }

    async fn list_error_logs(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ErrorLogEntry>, StoreError> {
        let mut entries: Vec<ErrorLogEntry> = self
            .error_logs
            .read()
            .await
            .iter()
            .filter(|e| {
                &e.learner == learner
                    && &e.language == language
                    && since.is_none_or(|s| e.timestamp >= s)
            })
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    async fn session_error_logs(
        &self,
        session: SessionId,
    ) -> Result<Vec<ErrorLogEntry>, StoreError> {
        let mut entries: Vec<ErrorLogEntry> = self
            .error_logs
            .read()
            .await
            .iter()
            .filter(|e| e.session == Some(session))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    async fn mark_error_corrected(&self, id: EventId) -> Result<bool, StoreError> {
        let mut logs = self.error_logs.write().await;
        match logs.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.corrected = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_memory(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
    ) -> Result<Option<LearnerMemory>, StoreError> {
        Ok(self
            .memories
            .read()
            .await
            .get(&(learner.clone(), language.clone()))
            .cloned())
    }

    async fn save_memory(&self, memory: &LearnerMemory) -> Result<u64, StoreError> {
        let key = (memory.learner.clone(), memory.language.clone());
        let mut memories = self.memories.write().await;

        let stored_version = memories.get(&key).map_or(0, |m| m.version);
        if memory.version != stored_version {
            return Err(StoreError::Conflict {
                key: format!("memory:{}:{}", memory.learner, memory.language),
                expected: memory.version,
                found: stored_version,
            });
        }

        let mut saved = memory.clone();
        saved.version = stored_version + 1;
        saved.updated_at = Utc::now();
        let version = saved.version;
        memories.insert(key, saved);
        Ok(version)
    }
}

/// In-memory [`CacheStore`] with TTL expiry checked on read.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, (serde_json::Value, Instant)>>,
}

impl MemoryCacheStore {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((value, deadline)) if Instant::now() < *deadline => Ok(Some(value.clone())),
            _ => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorCategory;

    fn learner() -> LearnerId {
        LearnerId::new("l-1")
    }

    fn language() -> LanguageCode {
        LanguageCode::new("es")
    }

    // ==================== Session Store Tests ====================

    #[tokio::test]
    async fn save_and_get_session() {
        let store = MemoryProgressStore::new();
        let session = Session::new(learner(), language(), None);
        store.save_session(&session).await.unwrap();

        let loaded = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn get_unknown_session_returns_none() {
        let store = MemoryProgressStore::new();
        assert!(store.get_session(SessionId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_active_session_ignores_terminal_and_other_languages() {
        let store = MemoryProgressStore::new();

        let mut completed = Session::new(learner(), language(), None);
        completed.complete().unwrap();
        store.save_session(&completed).await.unwrap();

        let other_lang = Session::new(learner(), LanguageCode::new("fr"), None);
        store.save_session(&other_lang).await.unwrap();

        assert!(store
            .find_active_session(&learner(), &language())
            .await
            .unwrap()
            .is_none());

        let active = Session::new(learner(), language(), None);
        store.save_session(&active).await.unwrap();

        let found = store
            .find_active_session(&learner(), &language())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, active.id);
    }

    #[tokio::test]
    async fn list_open_sessions_excludes_terminal() {
        let store = MemoryProgressStore::new();
        let open = Session::new(learner(), language(), None);
        store.save_session(&open).await.unwrap();

        let mut abandoned = Session::new(learner(), language(), None);
        abandoned.abandon();
        store.save_session(&abandoned).await.unwrap();

        let listed = store.list_open_sessions().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, open.id);
    }

    // ==================== Error Log Tests ====================

    #[tokio::test]
    async fn error_logs_filter_by_learner_language_and_window() {
        let store = MemoryProgressStore::new();
        let entry = ErrorLogEntry::new(learner(), language(), ErrorCategory::Grammar, "yo es");
        store.save_error_log(&entry).await.unwrap();

        let other = ErrorLogEntry::new(
            LearnerId::new("l-2"),
            language(),
            ErrorCategory::Grammar,
            "other",
        );
        store.save_error_log(&other).await.unwrap();

        let listed = store
            .list_error_logs(&learner(), &language(), None)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        let listed = store
            .list_error_logs(
                &learner(),
                &language(),
                Some(Utc::now() + chrono::Duration::hours(1)),
            )
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn mark_error_corrected_flips_flag() {
        let store = MemoryProgressStore::new();
        let entry = ErrorLogEntry::new(learner(), language(), ErrorCategory::Grammar, "yo es");
        store.save_error_log(&entry).await.unwrap();

        assert!(store.mark_error_corrected(entry.id).await.unwrap());
        let listed = store
            .list_error_logs(&learner(), &language(), None)
            .await
            .unwrap();
        assert!(listed[0].corrected);

        assert!(!store.mark_error_corrected(EventId::new()).await.unwrap());
    }

    // ==================== Memory CAS Tests ====================

    #[tokio::test]
    async fn save_memory_bumps_version() {
        let store = MemoryProgressStore::new();
        let memory = LearnerMemory::new(learner(), language());

        let v1 = store.save_memory(&memory).await.unwrap();
        assert_eq!(v1, 1);

        let loaded = store
            .get_memory(&learner(), &language())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn save_memory_with_stale_version_conflicts() {
        let store = MemoryProgressStore::new();
        let memory = LearnerMemory::new(learner(), language());
        store.save_memory(&memory).await.unwrap();

        // Still version 0 - stale
        let result = store.save_memory(&memory).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn save_memory_succeeds_after_reread() {
        let store = MemoryProgressStore::new();
        let memory = LearnerMemory::new(learner(), language());
        store.save_memory(&memory).await.unwrap();

        let mut current = store
            .get_memory(&learner(), &language())
            .await
            .unwrap()
            .unwrap();
        current.progress.streak_days = 3;
        let v2 = store.save_memory(&current).await.unwrap();
        assert_eq!(v2, 2);
    }

    // ==================== Cache Tests ====================

    #[tokio::test]
    async fn cache_set_get_delete() {
        let cache = MemoryCacheStore::new();
        cache
            .set("k", serde_json::json!({"a": 1}), Duration::from_secs(60))
            .await
            .unwrap();

        let value = cache.get("k").await.unwrap().unwrap();
        assert_eq!(value["a"], 1);

        cache.delete("k").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cache_entries_expire() {
        let cache = MemoryCacheStore::new();
        cache
            .set("k", serde_json::json!(true), Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("k").await.unwrap().is_none());
    }
}
