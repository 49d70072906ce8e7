//! Review recommendations
//!
//! Turns a learner's pattern focus areas, module averages, and scenario
//! error rates into a prioritized list of things to revisit. Curriculum
//! metadata (display names) comes from an external collaborator behind
//! [`CurriculumStore`]; recommendations degrade to raw IDs without it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use lingo_core::{
    LanguageCode, LearnerId, ModuleId, PatternKey, ProgressStore, ScenarioId, StoreError,
};

use crate::error::Result;
use crate::patterns::{focus_areas, update_trends};

/// Module average below which a review is recommended.
const MODULE_REVIEW_BAR: f64 = 70.0;

/// Module average below which the review becomes high priority.
const MODULE_URGENT_BAR: f64 = 50.0;

/// Minimum attempts before a scenario's error rate is judged.
const SCENARIO_MIN_ATTEMPTS: u64 = 3;

/// Urgency of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// What kind of thing is being recommended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Skill,
    Module,
    Scenario,
}

/// One prioritized review suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    /// Stable identifier: a pattern label, module ID, or scenario ID.
    pub target: String,
    /// Display name, falling back to the target when the curriculum has none.
    pub name: String,
    pub priority: Priority,
    /// The statistic that triggered the recommendation: a module average,
    /// a pattern's since-last-session count, or a scenario's error count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
    /// Where that statistic should land: the review bar, zero recurrences,
    /// or the learner's mean scenario error count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_score: Option<f64>,
    pub reason: String,
}

/// Read-only curriculum metadata.
#[async_trait]
pub trait CurriculumStore: Send + Sync {
    async fn module_name(&self, id: &ModuleId) -> std::result::Result<Option<String>, StoreError>;

    async fn scenario_name(
        &self,
        id: &ScenarioId,
    ) -> std::result::Result<Option<String>, StoreError>;
}

/// In-memory curriculum metadata for tests and default wiring.
#[derive(Default)]
pub struct MemoryCurriculumStore {
    modules: RwLock<HashMap<ModuleId, String>>,
    scenarios: RwLock<HashMap<ScenarioId, String>>,
}

impl MemoryCurriculumStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_module(&self, id: ModuleId, name: impl Into<String>) {
        self.modules.write().await.insert(id, name.into());
    }

    pub async fn add_scenario(&self, id: ScenarioId, name: impl Into<String>) {
        self.scenarios.write().await.insert(id, name.into());
    }
}

#[async_trait]
impl CurriculumStore for MemoryCurriculumStore {
    async fn module_name(&self, id: &ModuleId) -> std::result::Result<Option<String>, StoreError> {
        Ok(self.modules.read().await.get(id).cloned())
    }

    async fn scenario_name(
        &self,
        id: &ScenarioId,
    ) -> std::result::Result<Option<String>, StoreError> {
        Ok(self.scenarios.read().await.get(id).cloned())
    }
}

/// Produces prioritized review recommendations for a learner.
pub struct ReviewRecommender {
    store: Arc<dyn ProgressStore>,
    curriculum: Arc<dyn CurriculumStore>,
}

impl ReviewRecommender {
    pub fn new(store: Arc<dyn ProgressStore>, curriculum: Arc<dyn CurriculumStore>) -> Self {
        Self { store, curriculum }
    }

    /// Up to `limit` recommendations, highest priority first.
    ///
    /// Skill recommendations come from pattern focus areas, module
    /// recommendations from running averages below the review bar, and
    /// scenario recommendations from outlier error rates.
    pub async fn recommend(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
        limit: usize,
    ) -> Result<Vec<Recommendation>> {
        let Some(mut memory) = self.store.get_memory(learner, language).await? else {
            return Ok(Vec::new());
        };
        update_trends(&mut memory.patterns, chrono::Utc::now());

        let mut recommendations = Vec::new();
        self.recommend_skills(&memory.patterns, &mut recommendations);
        self.recommend_modules(&memory.progress.module_stats, &mut recommendations)
            .await?;
        self.recommend_scenarios(&memory.progress.scenario_stats, &mut recommendations)
            .await?;

        recommendations.sort_by_key(|r| r.priority);
        recommendations.truncate(limit);
        debug!(learner = %learner, count = recommendations.len(), "recommendations produced");
        Ok(recommendations)
    }

    fn recommend_skills(
        &self,
        patterns: &[lingo_core::ErrorPattern],
        out: &mut Vec<Recommendation>,
    ) {
        let focus = focus_areas(patterns);
        let describe = |key: &PatternKey, priority: Priority| {
            let pattern = patterns.iter().find(|p| &p.key == key);
            let (frequency, recent) =
                pattern.map_or((0, 0), |p| (p.frequency, p.recent_count));
            Recommendation {
                kind: RecommendationKind::Skill,
                target: key.label(),
                name: key.label(),
                priority,
                current: Some(recent as f64),
                target_score: Some(0.0),
                reason: format!(
                    "{} has come up {frequency} times overall and {recent} times since your \
                     last completed session",
                    key.label()
                ),
            }
        };

        if let Some(primary) = &focus.primary {
            out.push(describe(primary, Priority::High));
        }
        for key in &focus.secondary {
            out.push(describe(key, Priority::Medium));
        }
    }

    async fn recommend_modules(
        &self,
        module_stats: &HashMap<String, lingo_core::types::ModuleStats>,
        out: &mut Vec<Recommendation>,
    ) -> Result<()> {
        let mut below_bar: Vec<(&String, &lingo_core::types::ModuleStats)> = module_stats
            .iter()
            .filter(|(_, stats)| stats.assessments > 0 && stats.average_score < MODULE_REVIEW_BAR)
            .collect();
        below_bar.sort_by(|a, b| a.0.cmp(b.0));

        for (module, stats) in below_bar {
            let id = ModuleId::new(module.clone());
            let name = self
                .curriculum
                .module_name(&id)
                .await?
                .unwrap_or_else(|| module.clone());
            let priority = if stats.average_score < MODULE_URGENT_BAR {
                Priority::High
            } else {
                Priority::Medium
            };
            out.push(Recommendation {
                kind: RecommendationKind::Module,
                target: module.clone(),
                name,
                priority,
                current: Some(stats.average_score),
                target_score: Some(MODULE_REVIEW_BAR),
                reason: format!(
                    "your average of {:.0} across {} assessments is below the {:.0} review bar",
                    stats.average_score, stats.assessments, MODULE_REVIEW_BAR
                ),
            });
        }
        Ok(())
    }

    async fn recommend_scenarios(
        &self,
        scenario_stats: &HashMap<String, lingo_core::types::ScenarioStats>,
        out: &mut Vec<Recommendation>,
    ) -> Result<()> {
        let judged: Vec<(&String, &lingo_core::types::ScenarioStats)> = scenario_stats
            .iter()
            .filter(|(_, stats)| stats.attempts >= SCENARIO_MIN_ATTEMPTS)
            .collect();
        if judged.is_empty() {
            return Ok(());
        }
        let mean_errors =
            judged.iter().map(|(_, s)| s.error_count as f64).sum::<f64>() / judged.len() as f64;

        let mut outliers: Vec<(&String, &lingo_core::types::ScenarioStats)> = judged
            .into_iter()
            .filter(|(_, stats)| stats.error_count as f64 > mean_errors * 1.5)
            .collect();
        outliers.sort_by(|a, b| a.0.cmp(b.0));

        for (scenario, stats) in outliers {
            let id = ScenarioId::new(scenario.clone());
            let name = self
                .curriculum
                .scenario_name(&id)
                .await?
                .unwrap_or_else(|| scenario.clone());
            let priority = if stats.error_count as f64 > mean_errors * 2.0 {
                Priority::Medium
            } else {
                Priority::Low
            };
            out.push(Recommendation {
                kind: RecommendationKind::Scenario,
                target: scenario.clone(),
                name,
                priority,
                current: Some(stats.error_count as f64),
                target_score: Some(mean_errors),
                reason: format!(
                    "{} errors over {} attempts, well above your {:.1} average per scenario",
                    stats.error_count, stats.attempts, mean_errors
                ),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for ReviewRecommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewRecommender").finish_non_exhaustive()
    }
}
