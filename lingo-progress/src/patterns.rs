//! Error-pattern tracking and trend classification
//!
//! Folds individual error-log entries into the per-learner pattern aggregates
//! and labels each pattern with a trend by comparing its occurrences in the
//! last seven days against the seven days before that. A [`FocusAreas`]
//! summary surfaces what deserves attention right now.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use lingo_core::{
    ErrorLogEntry, ErrorPattern, EventId, LanguageCode, LearnerId, LearnerMemory, PatternKey,
    ProgressStore, StoreError, Trend,
};

use crate::error::Result;

/// Width of one trend comparison window.
const TREND_WINDOW_DAYS: i64 = 7;

/// Relative change in window counts that flips a trend off Stable.
const TREND_SHIFT_THRESHOLD: f64 = 0.20;

/// Cumulative frequency at which a non-improving pattern becomes a focus
/// candidate even without a worsening trend.
const FOCUS_FREQUENCY_FLOOR: u64 = 5;

/// How many secondary focus areas are surfaced.
const SECONDARY_FOCUS_LIMIT: usize = 3;

/// How many times a memory read-modify-write is re-read on version conflict
/// before giving up.
const MEMORY_RMW_ATTEMPTS: usize = 3;

/// Classify a trend from occurrence counts in two adjacent windows.
///
/// A pattern with no prior-window occurrences that shows up now is worsening;
/// one silent in both windows is stable no matter how large its lifetime
/// frequency is.
#[must_use]
pub fn classify_trend(previous: u64, current: u64) -> Trend {
    if previous == 0 {
        return if current == 0 {
            Trend::Stable
        } else {
            Trend::Worsening
        };
    }
    let delta = (current as f64 - previous as f64) / previous as f64;
    if delta <= -TREND_SHIFT_THRESHOLD {
        Trend::Improving
    } else if delta >= TREND_SHIFT_THRESHOLD {
        Trend::Worsening
    } else {
        Trend::Stable
    }
}

/// Relabel every pattern's trend as of `now`.
///
/// Windows are `[now - W, now)` against `[now - 2W, now - W)`, counted over
/// the retained examples.
pub fn update_trends(patterns: &mut [ErrorPattern], now: DateTime<Utc>) {
    let window = Duration::days(TREND_WINDOW_DAYS);
    for pattern in patterns {
        let current = window_count(pattern, now - window, now);
        let previous = window_count(pattern, now - window * 2, now - window);
        pattern.trend = classify_trend(previous, current);
    }
}

fn window_count(pattern: &ErrorPattern, from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    pattern
        .examples
        .iter()
        .filter(|e| e.timestamp >= from && e.timestamp < to)
        .count() as u64
}

/// What the learner should work on, derived from their patterns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FocusAreas {
    /// The single most pressing pattern, if any qualifies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<PatternKey>,
    /// Up to three runners-up, in priority order.
    pub secondary: Vec<PatternKey>,
    /// Patterns currently trending down; worth acknowledging, not drilling.
    pub improving: Vec<PatternKey>,
}

/// Rank patterns into focus areas.
///
/// Candidates are worsening patterns plus any non-improving pattern whose
/// lifetime frequency has crossed the floor. Worsening outranks everything;
/// ties break on recent count, then lifetime frequency.
#[must_use]
pub fn focus_areas(patterns: &[ErrorPattern]) -> FocusAreas {
    let improving: Vec<PatternKey> = patterns
        .iter()
        .filter(|p| p.trend == Trend::Improving)
        .map(|p| p.key.clone())
        .collect();

    let mut candidates: Vec<&ErrorPattern> = patterns
        .iter()
        .filter(|p| {
            p.trend == Trend::Worsening
                || (p.frequency >= FOCUS_FREQUENCY_FLOOR && p.trend != Trend::Improving)
        })
        .collect();
    candidates.sort_by(|a, b| {
        let a_worsening = a.trend == Trend::Worsening;
        let b_worsening = b.trend == Trend::Worsening;
        b_worsening
            .cmp(&a_worsening)
            .then(b.recent_count.cmp(&a.recent_count))
            .then(b.frequency.cmp(&a.frequency))
    });

    let mut keys = candidates.into_iter().map(|p| p.key.clone());
    FocusAreas {
        primary: keys.next(),
        secondary: keys.take(SECONDARY_FOCUS_LIMIT).collect(),
        improving,
    }
}

/// Folds error-log entries into learner memory and answers focus queries.
pub struct ErrorPatternTracker {
    store: Arc<dyn ProgressStore>,
}

impl ErrorPatternTracker {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    /// Record a detected error: append it to the durable log, then fold it
    /// into the learner's pattern aggregates and refresh trends.
    ///
    /// The memory update goes through the store's compare-and-swap with a
    /// bounded re-read on conflict; folding the same entry is keyed by the
    /// entry's own timestamp, so a retried fold lands in the same window.
    pub async fn record_error(&self, entry: ErrorLogEntry) -> Result<()> {
        self.store.save_error_log(&entry).await?;

        let key = PatternKey::new(entry.category, entry.subcategory.clone());
        let mut last_err = None;
        for _ in 0..MEMORY_RMW_ATTEMPTS {
            let mut memory = self
                .store
                .get_memory(&entry.learner, &entry.language)
                .await?
                .unwrap_or_else(|| {
                    LearnerMemory::new(entry.learner.clone(), entry.language.clone())
                });

            match memory.pattern_mut(&key) {
                Some(pattern) => pattern.record(entry.context.clone(), entry.timestamp),
                None => memory.patterns.push(ErrorPattern::first(
                    key.clone(),
                    entry.context.clone(),
                    entry.timestamp,
                )),
            }
            update_trends(&mut memory.patterns, Utc::now());

            match self.store.save_memory(&memory).await {
                Ok(_) => {
                    debug!(learner = %entry.learner, pattern = %key.label(), "error folded into patterns");
                    return Ok(());
                }
                Err(StoreError::Conflict { .. }) => {
                    warn!(learner = %entry.learner, "memory version conflict on error fold, re-reading");
                    last_err = Some(StoreError::Backend(
                        "pattern update lost the compare-and-swap race".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .unwrap_or_else(|| StoreError::Backend("pattern update failed".to_string()))
            .into())
    }

    /// Flip the corrected flag on a logged error.
    pub async fn mark_corrected(&self, id: EventId) -> Result<bool> {
        Ok(self.store.mark_error_corrected(id).await?)
    }

    /// The learner's current patterns with trends refreshed as of now.
    pub async fn patterns(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
    ) -> Result<Vec<ErrorPattern>> {
        let Some(mut memory) = self.store.get_memory(learner, language).await? else {
            return Ok(Vec::new());
        };
        update_trends(&mut memory.patterns, Utc::now());
        Ok(memory.patterns)
    }

    /// Focus areas for a learner, computed over refreshed trends.
    pub async fn focus_areas(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
    ) -> Result<FocusAreas> {
        Ok(focus_areas(&self.patterns(learner, language).await?))
    }
}

impl std::fmt::Debug for ErrorPatternTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorPatternTracker").finish_non_exhaustive()
    }
}
