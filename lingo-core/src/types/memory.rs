//! The durable learner-memory document.
//!
//! One versioned document per (learner, language), updated via
//! read-modify-write through [`crate::store::ProgressStore::save_memory`].
//! This is the state shared across sessions: progress data, error patterns,
//! and preferences.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ErrorPattern;
use super::ids::{LanguageCode, LearnerId, ModuleId, ScenarioId};
use super::level::CefrLevel;

/// Running statistics for one curriculum module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleStats {
    /// Number of assessments scoped to this module.
    pub assessments: u64,
    /// Running average overall score across those assessments.
    pub average_score: f64,
}

impl ModuleStats {
    /// Fold one more score into the running average.
    pub fn record_score(&mut self, score: f64) {
        let total = self.average_score * self.assessments as f64 + score;
        self.assessments += 1;
        self.average_score = total / self.assessments as f64;
    }
}

/// Running statistics for one practice scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioStats {
    pub attempts: u64,
    /// Errors detected across all attempts of this scenario.
    pub error_count: u64,
}

/// Cross-session progress data for a learner in one language.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressData {
    pub completed_modules: Vec<ModuleId>,
    pub completed_scenarios: Vec<ScenarioId>,
    /// Consecutive days with at least one completed session.
    pub streak_days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_practice: Option<DateTime<Utc>>,
    pub sessions_completed: u64,
    #[serde(default)]
    pub module_stats: HashMap<String, ModuleStats>,
    #[serde(default)]
    pub scenario_stats: HashMap<String, ScenarioStats>,
}

impl ProgressData {
    /// Record a completed session at `at`, maintaining the practice streak.
    pub fn record_session_completed(&mut self, at: DateTime<Utc>) {
        match self.last_practice {
            Some(last) => {
                let days_since = (at.date_naive() - last.date_naive()).num_days();
                if days_since == 1 {
                    self.streak_days += 1;
                } else if days_since > 1 {
                    self.streak_days = 1;
                }
                // Same-day completion leaves the streak untouched
            }
            None => self.streak_days = 1,
        }
        if self.last_practice.is_none_or(|last| at > last) {
            self.last_practice = Some(at);
        }
        self.sessions_completed += 1;
    }

    /// Whether a module has been completed.
    #[must_use]
    pub fn has_completed_module(&self, module: &ModuleId) -> bool {
        self.completed_modules.contains(module)
    }
}

/// Free-form learner preferences (surfaced to, not interpreted by, the core).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_goal_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_topics: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// The per-(learner, language) durable document.
///
/// `version` is a compare-and-swap counter: the store rejects a save whose
/// version does not match the stored one, so concurrent writers cannot
/// silently clobber each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerMemory {
    pub learner: LearnerId,
    pub language: LanguageCode,
    pub level: CefrLevel,
    pub progress: ProgressData,
    pub patterns: Vec<ErrorPattern>,
    #[serde(default)]
    pub preferences: Preferences,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl LearnerMemory {
    /// Create a fresh memory document at the entry level.
    #[must_use]
    pub fn new(learner: LearnerId, language: LanguageCode) -> Self {
        Self {
            learner,
            language,
            level: CefrLevel::default(),
            progress: ProgressData::default(),
            patterns: Vec::new(),
            preferences: Preferences::default(),
            updated_at: Utc::now(),
            version: 0,
        }
    }

    /// Zero `recent_count` on every pattern.
    ///
    /// Called exactly once per session completion, decoupling "ever happened"
    /// from "happening lately".
    pub fn reset_recent_counts(&mut self) {
        for pattern in &mut self.patterns {
            pattern.recent_count = 0;
        }
    }

    /// Find a pattern by category + subcategory.
    #[must_use]
    pub fn pattern(
        &self,
        key: &super::errors::PatternKey,
    ) -> Option<&ErrorPattern> {
        self.patterns.iter().find(|p| &p.key == key)
    }

    /// Mutable lookup by category + subcategory.
    pub fn pattern_mut(
        &mut self,
        key: &super::errors::PatternKey,
    ) -> Option<&mut ErrorPattern> {
        self.patterns.iter_mut().find(|p| &p.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::errors::{ErrorCategory, PatternKey};
    use chrono::Duration;

    fn memory() -> LearnerMemory {
        LearnerMemory::new(LearnerId::new("l-1"), LanguageCode::new("es"))
    }

    // ==================== ProgressData Tests ====================

    #[test]
    fn first_completion_starts_streak() {
        let mut progress = ProgressData::default();
        progress.record_session_completed(Utc::now());
        assert_eq!(progress.streak_days, 1);
        assert_eq!(progress.sessions_completed, 1);
        assert!(progress.last_practice.is_some());
    }

    #[test]
    fn next_day_completion_extends_streak() {
        let mut progress = ProgressData::default();
        let day1 = Utc::now() - Duration::days(1);
        progress.record_session_completed(day1);
        progress.record_session_completed(day1 + Duration::days(1));
        assert_eq!(progress.streak_days, 2);
    }

    #[test]
    fn same_day_completion_keeps_streak() {
        let mut progress = ProgressData::default();
        let now = Utc::now();
        progress.record_session_completed(now);
        progress.record_session_completed(now + Duration::hours(2));
        assert_eq!(progress.streak_days, 1);
        assert_eq!(progress.sessions_completed, 2);
    }

    #[test]
    fn gap_resets_streak() {
        let mut progress = ProgressData::default();
        let old = Utc::now() - Duration::days(5);
        progress.record_session_completed(old);
        progress.record_session_completed(Utc::now());
        assert_eq!(progress.streak_days, 1);
    }

    #[test]
    fn module_stats_running_average() {
        let mut stats = ModuleStats::default();
        stats.record_score(80.0);
        stats.record_score(60.0);
        assert_eq!(stats.assessments, 2);
        assert!((stats.average_score - 70.0).abs() < f64::EPSILON);
    }

    // ==================== LearnerMemory Tests ====================

    #[test]
    fn new_memory_starts_at_entry_level() {
        let mem = memory();
        assert_eq!(mem.level, CefrLevel::A2);
        assert_eq!(mem.version, 0);
        assert!(mem.patterns.is_empty());
    }

    #[test]
    fn reset_recent_counts_zeroes_all_patterns() {
        let mut mem = memory();
        let now = Utc::now();
        mem.patterns.push(crate::types::errors::ErrorPattern::first(
            PatternKey::new(ErrorCategory::Grammar, None),
            "a",
            now,
        ));
        mem.patterns.push(crate::types::errors::ErrorPattern::first(
            PatternKey::new(ErrorCategory::Vocabulary, None),
            "b",
            now,
        ));

        mem.reset_recent_counts();

        assert!(mem.patterns.iter().all(|p| p.recent_count == 0));
        // Frequency is untouched
        assert!(mem.patterns.iter().all(|p| p.frequency == 1));
    }

    #[test]
    fn memory_serialization_roundtrip_preserves_patterns() {
        let mut mem = memory();
        let now = Utc::now();
        let key = PatternKey::new(ErrorCategory::Grammar, Some("articles".to_string()));
        let mut pattern = crate::types::errors::ErrorPattern::first(key.clone(), "el agua", now);
        pattern.record("la problema", now + Duration::seconds(10));
        mem.patterns.push(pattern);

        let json = serde_json::to_string(&mem).unwrap();
        let parsed: LearnerMemory = serde_json::from_str(&json).unwrap();

        let restored = parsed.pattern(&key).expect("pattern should survive");
        let original = mem.pattern(&key).unwrap();
        assert_eq!(restored.frequency, original.frequency);
        assert_eq!(restored.recent_count, original.recent_count);
        assert_eq!(restored.trend, original.trend);
        assert_eq!(restored.examples, original.examples);
    }
}
