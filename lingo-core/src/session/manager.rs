//! SessionManager for driving session lifecycles against the store
//!
//! SessionManager is the one writer for session records. It enforces the
//! at-most-one-active-session invariant, routes every mutation through the
//! state machine, and mirrors session state into the optional fast-path
//! cache. The cache is advisory: any miss or garbled entry falls back to the
//! store and the cache is reconciled from it.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::{SessionError, StoreError};
use crate::events::SessionEvent;
use crate::store::{CacheStore, ProgressStore};
use crate::types::{LanguageCode, LearnerId, LearnerMemory, ScenarioId, SessionId};

use super::metrics::SessionMetrics;
use super::state::Session;

/// How long a cached session mirror stays fresh.
const SESSION_CACHE_TTL: StdDuration = StdDuration::from_secs(60);

/// How many times a memory read-modify-write is re-read on version conflict
/// before giving up.
const MEMORY_RMW_ATTEMPTS: usize = 3;

/// Drives session lifecycles for all learners.
pub struct SessionManager {
    store: Arc<dyn ProgressStore>,
    cache: Option<Arc<dyn CacheStore>>,
}

impl SessionManager {
    /// Create a manager over a durable store, with no cache.
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store, cache: None }
    }

    /// Attach a fast-path cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Start a new session.
    ///
    /// Fails with [`SessionError::ActiveSessionExists`] if the learner
    /// already has an ACTIVE session for the language.
    pub async fn create_session(
        &self,
        learner: LearnerId,
        language: LanguageCode,
        scenario: Option<ScenarioId>,
    ) -> Result<Session, SessionError> {
        if let Some(existing) = self.store.find_active_session(&learner, &language).await? {
            return Err(SessionError::ActiveSessionExists {
                learner,
                language,
                existing: existing.id,
            });
        }

        let session = Session::new(learner, language, scenario);
        self.store.save_session(&session).await?;
        self.write_cache(&session).await;
        info!(session = %session.id, learner = %session.learner, language = %session.language, "session created");
        Ok(session)
    }

    /// Fetch a session, preferring the cache.
    pub async fn get_session(&self, id: SessionId) -> Result<Session, SessionError> {
        if let Some(cached) = self.read_cache(id).await {
            return Ok(cached);
        }
        let session = self
            .store
            .get_session(id)
            .await?
            .ok_or(SessionError::NotFound(id))?;
        self.write_cache(&session).await;
        Ok(session)
    }

    /// All sessions for a (learner, language) pair, newest first.
    pub async fn list_sessions(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
    ) -> Result<Vec<Session>, SessionError> {
        Ok(self.store.list_sessions(learner, language).await?)
    }

    /// Append an event to an open session.
    pub async fn append_event(
        &self,
        id: SessionId,
        event: SessionEvent,
    ) -> Result<(), SessionError> {
        let mut session = self.load(id).await?;
        session.append(event)?;
        self.store.save_session(&session).await?;
        self.write_cache(&session).await;
        Ok(())
    }

    /// Pause an ACTIVE session.
    pub async fn pause(&self, id: SessionId) -> Result<Session, SessionError> {
        let mut session = self.load(id).await?;
        session.pause()?;
        self.store.save_session(&session).await?;
        self.write_cache(&session).await;
        Ok(session)
    }

    /// Resume a PAUSED session.
    pub async fn resume(&self, id: SessionId) -> Result<Session, SessionError> {
        let mut session = self.load(id).await?;
        session.resume()?;
        self.store.save_session(&session).await?;
        self.write_cache(&session).await;
        Ok(session)
    }

    /// Complete a session: freeze metrics and fold the completion into the
    /// learner-memory document (recent-count reset, streak, scenario stats).
    ///
    /// Idempotent: completing an already-COMPLETED session returns the frozen
    /// metrics without re-touching learner memory. The memory fold is
    /// best-effort: once the session is saved as COMPLETED a retry would
    /// take the idempotent path and never reach the fold again, so a fold
    /// failure is logged rather than surfaced as a completion failure.
    pub async fn complete(&self, id: SessionId) -> Result<SessionMetrics, SessionError> {
        let mut session = self.load(id).await?;
        if session.status == super::state::SessionStatus::Completed {
            return session.complete();
        }

        let metrics = session.complete()?;
        self.store.save_session(&session).await?;
        self.write_cache(&session).await;

        if let Err(e) = self.record_completion(&session, &metrics).await {
            warn!(session = %session.id, error = %e, "session completed but the memory fold failed");
        }
        info!(session = %session.id, overall = metrics.overall_score, "session completed");
        Ok(metrics)
    }

    /// Abandon a session. No-op on terminal sessions, safe to retry.
    pub async fn abandon(&self, id: SessionId) -> Result<Session, SessionError> {
        let mut session = self.load(id).await?;
        session.abandon();
        self.store.save_session(&session).await?;
        self.write_cache(&session).await;
        Ok(session)
    }

    /// Out-of-band sweep: abandon open sessions idle longer than `max_idle`
    /// or running longer than `max_duration`. Idempotent; returns the IDs it
    /// abandoned.
    pub async fn sweep_abandoned(
        &self,
        max_idle: Duration,
        max_duration: Duration,
    ) -> Result<Vec<SessionId>, SessionError> {
        let now = Utc::now();
        let mut swept = Vec::new();

        for mut session in self.store.list_open_sessions().await? {
            let idle = now - session.last_event_at();
            let running = now - session.started_at;
            if idle > max_idle || running > max_duration {
                session.abandon();
                self.store.save_session(&session).await?;
                self.write_cache(&session).await;
                debug!(session = %session.id, idle_secs = idle.num_seconds(), "session swept to abandoned");
                swept.push(session.id);
            }
        }
        Ok(swept)
    }

    /// Authoritative load from the store (mutations never trust the cache).
    async fn load(&self, id: SessionId) -> Result<Session, SessionError> {
        self.store
            .get_session(id)
            .await?
            .ok_or(SessionError::NotFound(id))
    }

    /// The once-per-completion learner-memory update, applied through the
    /// store's compare-and-swap with a bounded re-read on conflict.
    async fn record_completion(
        &self,
        session: &Session,
        metrics: &SessionMetrics,
    ) -> Result<(), SessionError> {
        let completed_at = session.completed_at.unwrap_or_else(Utc::now);

        let mut last_err = None;
        for _ in 0..MEMORY_RMW_ATTEMPTS {
            let mut memory = self
                .store
                .get_memory(&session.learner, &session.language)
                .await?
                .unwrap_or_else(|| {
                    LearnerMemory::new(session.learner.clone(), session.language.clone())
                });

            memory.reset_recent_counts();
            memory.progress.record_session_completed(completed_at);
            if let Some(scenario) = &session.scenario {
                let stats = memory
                    .progress
                    .scenario_stats
                    .entry(scenario.as_str().to_string())
                    .or_default();
                stats.attempts += 1;
                stats.error_count += u64::from(metrics.errors_detected);
            }

            match self.store.save_memory(&memory).await {
                Ok(_) => return Ok(()),
                Err(StoreError::Conflict { .. }) => {
                    warn!(learner = %session.learner, "memory version conflict on completion, re-reading");
                    last_err = Some(StoreError::Backend(
                        "memory update lost the compare-and-swap race".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .unwrap_or_else(|| StoreError::Backend("memory update failed".to_string()))
            .into())
    }

    fn cache_key(id: SessionId) -> String {
        format!("session:{id}")
    }

    async fn write_cache(&self, session: &Session) {
        let Some(cache) = &self.cache else { return };
        match serde_json::to_value(session) {
            Ok(value) => {
                if let Err(e) = cache
                    .set(&Self::cache_key(session.id), value, SESSION_CACHE_TTL)
                    .await
                {
                    warn!(session = %session.id, error = %e, "cache write failed, continuing");
                }
            }
            Err(e) => warn!(session = %session.id, error = %e, "session not cacheable"),
        }
    }

    async fn read_cache(&self, id: SessionId) -> Option<Session> {
        let cache = self.cache.as_ref()?;
        let value = match cache.get(&Self::cache_key(id)).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(session = %id, error = %e, "cache read failed, falling back to store");
                return None;
            }
        };
        match serde_json::from_value::<Session>(value) {
            Ok(session) => Some(session),
            Err(e) => {
                // Stale or garbled mirror: drop it and let the store answer
                warn!(session = %id, error = %e, "cached session unreadable, reconciling from store");
                let _ = cache.delete(&Self::cache_key(id)).await;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::store::{MemoryCacheStore, MemoryProgressStore};

    fn learner() -> LearnerId {
        LearnerId::new("l-1")
    }

    fn language() -> LanguageCode {
        LanguageCode::new("es")
    }

    fn manager() -> (SessionManager, Arc<MemoryProgressStore>) {
        let store = Arc::new(MemoryProgressStore::new());
        (SessionManager::new(store.clone()), store)
    }

    // ==================== Creation Tests ====================

    #[tokio::test]
    async fn create_session_persists_active_session() {
        let (manager, store) = manager();
        let session = manager
            .create_session(learner(), language(), None)
            .await
            .unwrap();

        let stored = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(stored.id, session.id);
    }

    #[tokio::test]
    async fn second_active_session_for_same_language_fails() {
        let (manager, _) = manager();
        manager
            .create_session(learner(), language(), None)
            .await
            .unwrap();

        let result = manager.create_session(learner(), language(), None).await;
        assert!(matches!(
            result,
            Err(SessionError::ActiveSessionExists { .. })
        ));
    }

    #[tokio::test]
    async fn active_session_allowed_for_different_language() {
        let (manager, _) = manager();
        manager
            .create_session(learner(), language(), None)
            .await
            .unwrap();

        let result = manager
            .create_session(learner(), LanguageCode::new("fr"), None)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn completing_frees_the_active_slot() {
        let (manager, _) = manager();
        let session = manager
            .create_session(learner(), language(), None)
            .await
            .unwrap();
        manager.complete(session.id).await.unwrap();

        assert!(manager
            .create_session(learner(), language(), None)
            .await
            .is_ok());
    }

    // ==================== Event Append Tests ====================

    #[tokio::test]
    async fn append_event_extends_stored_log() {
        let (manager, _) = manager();
        let session = manager
            .create_session(learner(), language(), None)
            .await
            .unwrap();

        manager
            .append_event(
                session.id,
                SessionEvent::message(EventKind::UserMessage, "hola"),
            )
            .await
            .unwrap();

        let loaded = manager.get_session(session.id).await.unwrap();
        assert_eq!(loaded.events.len(), 2);
    }

    #[tokio::test]
    async fn append_to_unknown_session_is_not_found() {
        let (manager, _) = manager();
        let result = manager
            .append_event(
                SessionId::new(),
                SessionEvent::message(EventKind::UserMessage, "hola"),
            )
            .await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn append_after_complete_fails() {
        let (manager, _) = manager();
        let session = manager
            .create_session(learner(), language(), None)
            .await
            .unwrap();
        manager.complete(session.id).await.unwrap();

        let result = manager
            .append_event(
                session.id,
                SessionEvent::message(EventKind::UserMessage, "late"),
            )
            .await;
        assert!(matches!(result, Err(SessionError::Terminal { .. })));
    }

    // ==================== Completion Tests ====================

    #[tokio::test]
    async fn complete_is_idempotent_through_manager() {
        let (manager, _) = manager();
        let session = manager
            .create_session(learner(), language(), None)
            .await
            .unwrap();
        manager
            .append_event(
                session.id,
                SessionEvent::message(EventKind::UserMessage, "hola"),
            )
            .await
            .unwrap();

        let first = manager.complete(session.id).await.unwrap();
        let second = manager.complete(session.id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn complete_updates_learner_memory() {
        let (manager, store) = manager();
        let session = manager
            .create_session(learner(), language(), Some(ScenarioId::new("cafe")))
            .await
            .unwrap();
        manager.complete(session.id).await.unwrap();

        let memory = store
            .get_memory(&learner(), &language())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(memory.progress.sessions_completed, 1);
        assert_eq!(memory.progress.streak_days, 1);
        assert_eq!(memory.progress.scenario_stats["cafe"].attempts, 1);
    }

    #[tokio::test]
    async fn double_complete_updates_memory_once() {
        let (manager, store) = manager();
        let session = manager
            .create_session(learner(), language(), None)
            .await
            .unwrap();
        manager.complete(session.id).await.unwrap();
        manager.complete(session.id).await.unwrap();

        let memory = store
            .get_memory(&learner(), &language())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(memory.progress.sessions_completed, 1);
    }

    /// Store whose memory saves always lose the compare-and-swap race.
    struct ContendedMemoryStore {
        inner: MemoryProgressStore,
    }

    #[async_trait::async_trait]
    impl ProgressStore for ContendedMemoryStore {
        async fn save_session(&self, session: &Session) -> Result<(), StoreError> {
            self.inner.save_session(session).await
        }

        async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
            self.inner.get_session(id).await
        }

        async fn find_active_session(
            &self,
            learner: &LearnerId,
            language: &LanguageCode,
        ) -> Result<Option<Session>, StoreError> {
            self.inner.find_active_session(learner, language).await
        }

        async fn list_sessions(
            &self,
            learner: &LearnerId,
            language: &LanguageCode,
        ) -> Result<Vec<Session>, StoreError> {
            self.inner.list_sessions(learner, language).await
        }

        async fn list_open_sessions(&self) -> Result<Vec<Session>, StoreError> {
            self.inner.list_open_sessions().await
        }

        async fn save_error_log(
            &self,
            entry: &crate::types::ErrorLogEntry,
        ) -> Result<(), StoreError> {
            self.inner.save_error_log(entry).await
        }

        async fn list_error_logs(
            &self,
            learner: &LearnerId,
            language: &LanguageCode,
            since: Option<chrono::DateTime<Utc>>,
        ) -> Result<Vec<crate::types::ErrorLogEntry>, StoreError> {
            self.inner.list_error_logs(learner, language, since).await
        }

        async fn session_error_logs(
            &self,
            session: SessionId,
        ) -> Result<Vec<crate::types::ErrorLogEntry>, StoreError> {
            self.inner.session_error_logs(session).await
        }

        async fn mark_error_corrected(
            &self,
            id: crate::types::EventId,
        ) -> Result<bool, StoreError> {
            self.inner.mark_error_corrected(id).await
        }

        async fn get_memory(
            &self,
            learner: &LearnerId,
            language: &LanguageCode,
        ) -> Result<Option<LearnerMemory>, StoreError> {
            self.inner.get_memory(learner, language).await
        }

        async fn save_memory(&self, memory: &LearnerMemory) -> Result<u64, StoreError> {
            Err(StoreError::Conflict {
                key: format!("memory:{}:{}", memory.learner, memory.language),
                expected: memory.version,
                found: memory.version + 1,
            })
        }
    }

    #[tokio::test]
    async fn complete_survives_a_lost_memory_race() {
        let store = Arc::new(ContendedMemoryStore {
            inner: MemoryProgressStore::new(),
        });
        let manager = SessionManager::new(store.clone());
        let session = manager
            .create_session(learner(), language(), None)
            .await
            .unwrap();

        // Every memory save conflicts, but completion still succeeds
        let metrics = manager.complete(session.id).await.unwrap();

        let stored = store.get_session(session.id).await.unwrap().unwrap();
        assert!(stored.status.is_terminal());
        assert_eq!(manager.complete(session.id).await.unwrap(), metrics);
    }

    // ==================== Abandon & Sweep Tests ====================

    #[tokio::test]
    async fn abandon_is_retry_safe() {
        let (manager, _) = manager();
        let session = manager
            .create_session(learner(), language(), None)
            .await
            .unwrap();

        let first = manager.abandon(session.id).await.unwrap();
        let second = manager.abandon(session.id).await.unwrap();
        assert_eq!(first.status, second.status);
    }

    #[tokio::test]
    async fn sweep_abandons_overdue_sessions() {
        let (manager, store) = manager();
        let session = manager
            .create_session(learner(), language(), None)
            .await
            .unwrap();

        // Zero tolerances: everything open is overdue
        let swept = manager
            .sweep_abandoned(Duration::seconds(-1), Duration::seconds(-1))
            .await
            .unwrap();
        assert_eq!(swept, vec![session.id]);

        let stored = store.get_session(session.id).await.unwrap().unwrap();
        assert!(stored.status.is_terminal());

        // Second sweep finds nothing open
        let swept = manager
            .sweep_abandoned(Duration::seconds(-1), Duration::seconds(-1))
            .await
            .unwrap();
        assert!(swept.is_empty());
    }

    #[tokio::test]
    async fn sweep_leaves_fresh_sessions_alone() {
        let (manager, _) = manager();
        manager
            .create_session(learner(), language(), None)
            .await
            .unwrap();

        let swept = manager
            .sweep_abandoned(Duration::hours(1), Duration::hours(4))
            .await
            .unwrap();
        assert!(swept.is_empty());
    }

    // ==================== Cache Tests ====================

    #[tokio::test]
    async fn get_session_works_without_cache() {
        let (manager, _) = manager();
        let session = manager
            .create_session(learner(), language(), None)
            .await
            .unwrap();
        assert!(manager.get_session(session.id).await.is_ok());
    }

    #[tokio::test]
    async fn cached_session_is_served_and_reconciled_when_garbled() {
        let store = Arc::new(MemoryProgressStore::new());
        let cache = Arc::new(MemoryCacheStore::new());
        let manager = SessionManager::new(store.clone()).with_cache(cache.clone());

        let session = manager
            .create_session(learner(), language(), None)
            .await
            .unwrap();

        // Served from cache
        let loaded = manager.get_session(session.id).await.unwrap();
        assert_eq!(loaded.id, session.id);

        // Garble the cache entry; the store must still answer
        cache
            .set(
                &format!("session:{}", session.id),
                serde_json::json!("not a session"),
                StdDuration::from_secs(60),
            )
            .await
            .unwrap();

        let loaded = manager.get_session(session.id).await.unwrap();
        assert_eq!(loaded.id, session.id);
    }

    #[tokio::test]
    async fn cache_absence_changes_nothing_observable() {
        let store = Arc::new(MemoryProgressStore::new());
        let with_cache = SessionManager::new(store.clone())
            .with_cache(Arc::new(MemoryCacheStore::new()));
        let without_cache = SessionManager::new(store.clone());

        let session = with_cache
            .create_session(learner(), language(), None)
            .await
            .unwrap();

        let a = with_cache.get_session(session.id).await.unwrap();
        let b = without_cache.get_session(session.id).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.status, b.status);
    }
}
