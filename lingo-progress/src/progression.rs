//! Competency thresholds and level progression
//!
//! A learner advances one CEFR level at a time. Eligibility is judged
//! against the thresholds of their *current* level: enough recent
//! assessments, overall and per-dimension rolling averages over the bars,
//! consistent recent performance, and the level's required modules
//! completed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use lingo_core::{
    CefrLevel, LanguageCode, LearnerId, LearnerMemory, ModuleId, ProgressStore, StoreError,
};

use crate::assessment::{Assessment, AssessmentStore};
use crate::error::{ProgressError, Result};

/// Window over which eligibility averages are computed.
const EVALUATION_WINDOW_DAYS: i64 = 30;

/// Minimum assessments inside the window before eligibility is judged.
const MIN_ASSESSMENTS: usize = 3;

/// How many recent assessments the consistency check samples.
const CONSISTENCY_SAMPLE: usize = 5;

/// Overall-score standard deviation at or above which performance is judged
/// inconsistent.
const CONSISTENCY_MAX_STD_DEV: f64 = 15.0;

/// How many times a memory read-modify-write is re-read on version conflict
/// before giving up.
const MEMORY_RMW_ATTEMPTS: usize = 3;

/// Score bars (overall plus three dimensions) and required modules for one
/// level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyThreshold {
    pub overall: f64,
    pub fluency: f64,
    pub accuracy: f64,
    pub appropriacy: f64,
    pub required_modules: Vec<ModuleId>,
}

impl CompetencyThreshold {
    fn new(overall: f64, fluency: f64, accuracy: f64, appropriacy: f64, modules: &[&str]) -> Self {
        Self {
            overall,
            fluency,
            accuracy,
            appropriacy,
            required_modules: modules.iter().map(|m| ModuleId::new(*m)).collect(),
        }
    }
}

/// The full ladder of competency thresholds, keyed by current level.
#[derive(Debug, Clone)]
pub struct CompetencyTable {
    thresholds: HashMap<CefrLevel, CompetencyThreshold>,
}

impl Default for CompetencyTable {
    fn default() -> Self {
        let mut thresholds = HashMap::new();
        thresholds.insert(
            CefrLevel::A2,
            CompetencyThreshold::new(60.0, 55.0, 55.0, 50.0, &["foundations-1", "foundations-2"]),
        );
        thresholds.insert(
            CefrLevel::B1,
            CompetencyThreshold::new(
                70.0,
                65.0,
                65.0,
                60.0,
                &["conversation-1", "grammar-essentials"],
            ),
        );
        thresholds.insert(
            CefrLevel::B2,
            CompetencyThreshold::new(75.0, 70.0, 75.0, 70.0, &["conversation-2", "idiom-workshop"]),
        );
        thresholds.insert(
            CefrLevel::C1,
            CompetencyThreshold::new(80.0, 75.0, 80.0, 75.0, &["debate-1", "register-mastery"]),
        );
        thresholds.insert(
            CefrLevel::C2,
            CompetencyThreshold::new(85.0, 80.0, 85.0, 80.0, &["nuance-seminar"]),
        );
        Self { thresholds }
    }
}

impl CompetencyTable {
    /// The threshold row for a level.
    ///
    /// Every level has a row in the default table; a custom table missing one
    /// falls back to the top row's bars.
    #[must_use]
    pub fn threshold(&self, level: CefrLevel) -> &CompetencyThreshold {
        self.thresholds
            .get(&level)
            .or_else(|| self.thresholds.get(&CefrLevel::C2))
            .unwrap_or(&FALLBACK_THRESHOLD)
    }
}

static FALLBACK_THRESHOLD: CompetencyThreshold = CompetencyThreshold {
    overall: 85.0,
    fluency: 80.0,
    accuracy: 85.0,
    appropriacy: 80.0,
    required_modules: Vec::new(),
};

/// One dimension's standing against its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyProgress {
    pub dimension: String,
    pub current: f64,
    pub required: f64,
    pub met: bool,
}

/// The result of an eligibility evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionEvaluation {
    pub current_level: CefrLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_level: Option<CefrLevel>,
    pub eligible: bool,
    /// Why the learner cannot advance yet; empty when eligible.
    pub blockers: Vec<String>,
    /// Per-dimension standing, present once there is enough data to judge.
    pub breakdown: Vec<CompetencyProgress>,
}

impl ProgressionEvaluation {
    /// Fraction of the way to the next level, as the mean of each
    /// dimension's capped current/required ratio. Zero without a breakdown.
    #[must_use]
    pub fn progress_to_next(&self) -> f64 {
        if self.breakdown.is_empty() {
            return 0.0;
        }
        self.breakdown
            .iter()
            .map(|p| (p.current / p.required).min(1.0))
            .sum::<f64>()
            / self.breakdown.len() as f64
    }
}

/// Judges and applies CEFR level advancement.
pub struct ProgressionEngine {
    store: Arc<dyn ProgressStore>,
    assessments: Arc<dyn AssessmentStore>,
    table: CompetencyTable,
}

impl ProgressionEngine {
    pub fn new(store: Arc<dyn ProgressStore>, assessments: Arc<dyn AssessmentStore>) -> Self {
        Self {
            store,
            assessments,
            table: CompetencyTable::default(),
        }
    }

    /// Swap in a custom threshold table.
    #[must_use]
    pub fn with_table(mut self, table: CompetencyTable) -> Self {
        self.table = table;
        self
    }

    /// Judge whether the learner can advance from their current level.
    pub async fn evaluate(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
    ) -> Result<ProgressionEvaluation> {
        let memory = self.store.get_memory(learner, language).await?;
        let current_level = memory.as_ref().map_or(CefrLevel::default(), |m| m.level);
        let next_level = current_level.next();

        let cutoff = Utc::now() - Duration::days(EVALUATION_WINDOW_DAYS);
        let window = self
            .assessments
            .list_assessments(learner, language, Some(cutoff))
            .await?;

        let mut blockers = Vec::new();
        if window.len() < MIN_ASSESSMENTS {
            blockers.push(format!(
                "insufficient data: {} assessments in the last {EVALUATION_WINDOW_DAYS} days, \
                 {MIN_ASSESSMENTS} required",
                window.len()
            ));
            return Ok(ProgressionEvaluation {
                current_level,
                next_level,
                eligible: false,
                blockers,
                breakdown: Vec::new(),
            });
        }

        let threshold = self.table.threshold(current_level);
        let breakdown = breakdown_for(&window, threshold);

        // A C2 learner still gets their standing against the C2 bars
        let Some(next_level) = next_level else {
            return Ok(ProgressionEvaluation {
                current_level,
                next_level: None,
                eligible: false,
                blockers: vec!["cannot advance further".to_string()],
                breakdown,
            });
        };
        for progress in &breakdown {
            if !progress.met {
                blockers.push(format!(
                    "{} average {:.0} is below the {:.0} required",
                    progress.dimension, progress.current, progress.required
                ));
            }
        }

        let recent: Vec<f64> = window
            .iter()
            .rev()
            .take(CONSISTENCY_SAMPLE)
            .map(|a| a.scores.overall)
            .collect();
        let deviation = std_dev(&recent);
        if deviation >= CONSISTENCY_MAX_STD_DEV {
            blockers.push(format!(
                "not yet consistent: overall scores vary by {deviation:.0} across your last \
                 {} assessments",
                recent.len()
            ));
        }

        let completed = memory.map(|m| m.progress.completed_modules).unwrap_or_default();
        for module in &threshold.required_modules {
            if !completed.contains(module) {
                blockers.push(format!("module {module} not yet completed"));
            }
        }

        Ok(ProgressionEvaluation {
            current_level,
            next_level: Some(next_level),
            eligible: blockers.is_empty(),
            blockers,
            breakdown,
        })
    }

    /// Per-dimension standing against the bars of an arbitrary level,
    /// computed over the evaluation window. Empty when the learner has no
    /// assessments in the window.
    pub async fn competency_breakdown(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
        level: CefrLevel,
    ) -> Result<Vec<CompetencyProgress>> {
        let cutoff = Utc::now() - Duration::days(EVALUATION_WINDOW_DAYS);
        let window = self
            .assessments
            .list_assessments(learner, language, Some(cutoff))
            .await?;
        if window.is_empty() {
            return Ok(Vec::new());
        }
        Ok(breakdown_for(&window, self.table.threshold(level)))
    }

    /// Advance the learner to the next level if they are eligible.
    ///
    /// Re-evaluates at call time, then applies the level change through the
    /// store's compare-and-swap with a bounded re-read on conflict.
    pub async fn advance(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
    ) -> Result<CefrLevel> {
        let evaluation = self.evaluate(learner, language).await?;
        if !evaluation.eligible {
            return Err(ProgressError::CannotAdvance(
                evaluation.blockers.join("; "),
            ));
        }
        let from = evaluation.current_level;
        let to = evaluation
            .next_level
            .ok_or_else(|| ProgressError::CannotAdvance("cannot advance further".to_string()))?;

        let mut last_err = None;
        for _ in 0..MEMORY_RMW_ATTEMPTS {
            let mut memory = self
                .store
                .get_memory(learner, language)
                .await?
                .unwrap_or_else(|| LearnerMemory::new(learner.clone(), language.clone()));

            // A concurrent writer may already have moved the level
            if memory.level != from {
                return Ok(memory.level);
            }
            memory.level = to;

            match self.store.save_memory(&memory).await {
                Ok(_) => {
                    info!(learner = %learner, from = %from, to = %to, "level advanced");
                    return Ok(to);
                }
                Err(StoreError::Conflict { .. }) => {
                    warn!(learner = %learner, "memory version conflict on advancement, re-reading");
                    last_err = Some(StoreError::Backend(
                        "level advancement lost the compare-and-swap race".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .unwrap_or_else(|| StoreError::Backend("level advancement failed".to_string()))
            .into())
    }
}

impl std::fmt::Debug for ProgressionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressionEngine").finish_non_exhaustive()
    }
}

fn breakdown_for(window: &[Assessment], threshold: &CompetencyThreshold) -> Vec<CompetencyProgress> {
    let n = window.len() as f64;
    let average = |f: fn(&Assessment) -> f64| window.iter().map(f).sum::<f64>() / n;

    let rows = [
        ("overall", average(|a| a.scores.overall), threshold.overall),
        ("fluency", average(|a| a.scores.fluency.score), threshold.fluency),
        (
            "accuracy",
            average(|a| a.scores.accuracy.score),
            threshold.accuracy,
        ),
        (
            "appropriacy",
            average(|a| a.scores.appropriacy.score),
            threshold.appropriacy,
        ),
    ];
    rows.into_iter()
        .map(|(dimension, current, required)| CompetencyProgress {
            dimension: dimension.to_string(),
            current,
            required,
            met: current >= required,
        })
        .collect()
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
