//! The learner-facing progress summary
//!
//! One call that composes memory, rolling averages, focus areas, the
//! progression evaluation, and recommendations into a single document for
//! the caller to render.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use lingo_core::{CefrLevel, LanguageCode, LearnerId, ProgressStore};

use crate::assessment::{AssessmentService, RollingAverages};
use crate::error::Result;
use crate::patterns::{focus_areas, update_trends, FocusAreas};
use crate::progression::{ProgressionEngine, ProgressionEvaluation};
use crate::recommend::{Recommendation, ReviewRecommender};

/// How many recommendations a summary carries.
const SUMMARY_RECOMMENDATION_LIMIT: usize = 5;

/// Everything a learner's progress view needs in one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub learner: LearnerId,
    pub language: LanguageCode,
    pub level: CefrLevel,
    pub streak_days: u32,
    pub sessions_completed: u64,
    pub modules_completed: usize,
    pub scenarios_completed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_practice: Option<DateTime<Utc>>,
    /// Rolling thirty-day averages, absent before the first assessment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub averages: Option<RollingAverages>,
    pub focus: FocusAreas,
    pub progression: ProgressionEvaluation,
    pub recommendations: Vec<Recommendation>,
}

/// Builds [`ProgressSummary`] documents from the other services.
pub struct SummaryService {
    store: Arc<dyn ProgressStore>,
    assessments: Arc<AssessmentService>,
    progression: Arc<ProgressionEngine>,
    recommender: Arc<ReviewRecommender>,
}

impl SummaryService {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        assessments: Arc<AssessmentService>,
        progression: Arc<ProgressionEngine>,
        recommender: Arc<ReviewRecommender>,
    ) -> Self {
        Self {
            store,
            assessments,
            progression,
            recommender,
        }
    }

    /// Compose the full summary for a learner. A learner with no history
    /// gets an entry-level summary rather than an error.
    pub async fn summarize(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
    ) -> Result<ProgressSummary> {
        let memory = self.store.get_memory(learner, language).await?;

        let (level, progress, mut patterns) = match memory {
            Some(memory) => (memory.level, memory.progress, memory.patterns),
            None => (CefrLevel::default(), Default::default(), Vec::new()),
        };
        update_trends(&mut patterns, Utc::now());
        let focus = focus_areas(&patterns);

        let averages = self.assessments.rolling_averages(learner, language).await?;
        let progression = self.progression.evaluate(learner, language).await?;
        let recommendations = self
            .recommender
            .recommend(learner, language, SUMMARY_RECOMMENDATION_LIMIT)
            .await?;

        debug!(learner = %learner, language = %language, "summary composed");
        Ok(ProgressSummary {
            learner: learner.clone(),
            language: language.clone(),
            level,
            streak_days: progress.streak_days,
            sessions_completed: progress.sessions_completed,
            modules_completed: progress.completed_modules.len(),
            scenarios_completed: progress.completed_scenarios.len(),
            last_practice: progress.last_practice,
            averages,
            focus,
            progression,
            recommendations,
        })
    }
}

impl std::fmt::Debug for SummaryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryService").finish_non_exhaustive()
    }
}
