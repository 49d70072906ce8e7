//! Assessment creation and history
//!
//! An assessment freezes one scoring pass over a session (or a module
//! checkpoint) together with the recommendations produced alongside it.
//! Persisting the assessment is the one hard requirement; recommendation
//! and module-average bookkeeping degrade to warnings so a flaky
//! collaborator never costs the learner their scores.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use lingo_core::{
    AssessmentId, LanguageCode, LearnerId, LearnerMemory, ModuleId, ProgressStore, SessionId,
    StoreError,
};

use crate::error::{ProgressError, Result};
use crate::recommend::{Recommendation, ReviewRecommender};
use crate::scoring::{ScoreInput, ScoreSet, ScoringHeuristics};

/// Window over which rolling averages are computed.
const ROLLING_WINDOW_DAYS: i64 = 30;

/// How many recommendations ride along with an assessment.
const RECOMMENDATION_LIMIT: usize = 5;

/// How many times a memory read-modify-write is re-read on version conflict
/// before giving up.
const MEMORY_RMW_ATTEMPTS: usize = 3;

/// What prompted an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentKind {
    /// Scored in passing from an ordinary practice session.
    Informal,
    /// A module checkpoint.
    Milestone,
}

/// One frozen scoring pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub learner: LearnerId,
    pub language: LanguageCode,
    pub kind: AssessmentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleId>,
    pub scores: ScoreSet,
    pub recommendations: Vec<Recommendation>,
    pub created_at: DateTime<Utc>,
}

impl Assessment {
    /// Create an assessment stamped with the current time.
    #[must_use]
    pub fn new(
        learner: LearnerId,
        language: LanguageCode,
        kind: AssessmentKind,
        scores: ScoreSet,
    ) -> Self {
        Self {
            id: AssessmentId::new(),
            learner,
            language,
            kind,
            session: None,
            module: None,
            scores,
            recommendations: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach the session this assessment was scored from.
    #[must_use]
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    /// Scope the assessment to a curriculum module.
    #[must_use]
    pub fn with_module(mut self, module: ModuleId) -> Self {
        self.module = Some(module);
        self
    }
}

/// Durable storage for assessments.
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn save_assessment(&self, assessment: &Assessment)
        -> std::result::Result<(), StoreError>;

    async fn get_assessment(
        &self,
        id: AssessmentId,
    ) -> std::result::Result<Option<Assessment>, StoreError>;

    /// Assessments for a (learner, language) pair, oldest first, optionally
    /// bounded to a time window.
    async fn list_assessments(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
        since: Option<DateTime<Utc>>,
    ) -> std::result::Result<Vec<Assessment>, StoreError>;
}

/// In-memory assessment store for tests and default wiring.
#[derive(Default)]
pub struct MemoryAssessmentStore {
    assessments: RwLock<Vec<Assessment>>,
}

impl MemoryAssessmentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssessmentStore for MemoryAssessmentStore {
    async fn save_assessment(
        &self,
        assessment: &Assessment,
    ) -> std::result::Result<(), StoreError> {
        let mut assessments = self.assessments.write().await;
        if let Some(existing) = assessments.iter_mut().find(|a| a.id == assessment.id) {
            *existing = assessment.clone();
        } else {
            assessments.push(assessment.clone());
        }
        Ok(())
    }

    async fn get_assessment(
        &self,
        id: AssessmentId,
    ) -> std::result::Result<Option<Assessment>, StoreError> {
        Ok(self
            .assessments
            .read()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn list_assessments(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
        since: Option<DateTime<Utc>>,
    ) -> std::result::Result<Vec<Assessment>, StoreError> {
        let mut matching: Vec<Assessment> = self
            .assessments
            .read()
            .await
            .iter()
            .filter(|a| {
                &a.learner == learner
                    && &a.language == language
                    && since.is_none_or(|cutoff| a.created_at >= cutoff)
            })
            .cloned()
            .collect();
        matching.sort_by_key(|a| a.created_at);
        Ok(matching)
    }
}

/// Per-dimension averages over the rolling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingAverages {
    pub overall: f64,
    pub fluency: f64,
    pub accuracy: f64,
    pub appropriacy: f64,
    pub confidence: f64,
    /// How many assessments the averages cover.
    pub assessments: usize,
}

/// Scores sessions and maintains assessment history.
pub struct AssessmentService {
    store: Arc<dyn ProgressStore>,
    assessments: Arc<dyn AssessmentStore>,
    recommender: Arc<ReviewRecommender>,
    heuristics: ScoringHeuristics,
}

impl AssessmentService {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        assessments: Arc<dyn AssessmentStore>,
        recommender: Arc<ReviewRecommender>,
    ) -> Self {
        Self {
            store,
            assessments,
            recommender,
            heuristics: ScoringHeuristics::default(),
        }
    }

    /// Swap in tuned scoring heuristics.
    #[must_use]
    pub fn with_heuristics(mut self, heuristics: ScoringHeuristics) -> Self {
        self.heuristics = heuristics;
        self
    }

    /// Score a session and persist the resulting assessment.
    ///
    /// Scoring reads the session's event log plus the errors logged against
    /// it. Recommendations are best-effort: a recommender failure is logged
    /// and the assessment ships without them. The module running average is
    /// likewise best-effort once the assessment itself is saved.
    pub async fn assess_session(
        &self,
        session_id: SessionId,
        module: Option<ModuleId>,
    ) -> Result<Assessment> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| ProgressError::NotFound(format!("session {session_id}")))?;
        let errors = self.store.session_error_logs(session_id).await?;

        let input = ScoreInput::from_events(&session.events, &errors);
        let scores = ScoreSet::compute(&input, &self.heuristics);

        let recommendations = match self
            .recommender
            .recommend(&session.learner, &session.language, RECOMMENDATION_LIMIT)
            .await
        {
            Ok(recommendations) => recommendations,
            Err(e) => {
                warn!(session = %session_id, error = %e, "recommendations failed, assessing without them");
                Vec::new()
            }
        };

        let kind = if module.is_some() {
            AssessmentKind::Milestone
        } else {
            AssessmentKind::Informal
        };
        let mut assessment = Assessment::new(
            session.learner.clone(),
            session.language.clone(),
            kind,
            scores,
        )
        .with_session(session_id);
        if let Some(module) = module.clone() {
            assessment = assessment.with_module(module);
        }
        assessment.recommendations = recommendations;

        self.assessments.save_assessment(&assessment).await?;
        info!(
            assessment = %assessment.id,
            session = %session_id,
            overall = assessment.scores.overall,
            "assessment recorded"
        );

        if let Some(module) = module {
            if let Err(e) = self
                .record_module_score(
                    &session.learner,
                    &session.language,
                    &module,
                    assessment.scores.overall,
                )
                .await
            {
                warn!(module = %module, error = %e, "module average update failed, assessment already saved");
            }
        }

        Ok(assessment)
    }

    /// Fetch an assessment by ID.
    pub async fn get(&self, id: AssessmentId) -> Result<Assessment> {
        self.assessments
            .get_assessment(id)
            .await?
            .ok_or_else(|| ProgressError::NotFound(format!("assessment {id}")))
    }

    /// Assessment history for a learner, oldest first.
    pub async fn history(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
    ) -> Result<Vec<Assessment>> {
        Ok(self
            .assessments
            .list_assessments(learner, language, None)
            .await?)
    }

    /// Per-dimension averages over the last thirty days, or `None` when no
    /// assessments fall inside the window.
    pub async fn rolling_averages(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
    ) -> Result<Option<RollingAverages>> {
        let cutoff = Utc::now() - Duration::days(ROLLING_WINDOW_DAYS);
        let window = self
            .assessments
            .list_assessments(learner, language, Some(cutoff))
            .await?;
        if window.is_empty() {
            return Ok(None);
        }

        let n = window.len() as f64;
        let sum = |f: fn(&Assessment) -> f64| window.iter().map(f).sum::<f64>() / n;
        Ok(Some(RollingAverages {
            overall: sum(|a| a.scores.overall),
            fluency: sum(|a| a.scores.fluency.score),
            accuracy: sum(|a| a.scores.accuracy.score),
            appropriacy: sum(|a| a.scores.appropriacy.score),
            confidence: sum(|a| a.scores.confidence.score),
            assessments: window.len(),
        }))
    }

    /// Fold an overall score into the module's running average, through the
    /// store's compare-and-swap with a bounded re-read on conflict.
    async fn record_module_score(
        &self,
        learner: &LearnerId,
        language: &LanguageCode,
        module: &ModuleId,
        score: f64,
    ) -> Result<()> {
        let mut last_err = None;
        for _ in 0..MEMORY_RMW_ATTEMPTS {
            let mut memory = self
                .store
                .get_memory(learner, language)
                .await?
                .unwrap_or_else(|| LearnerMemory::new(learner.clone(), language.clone()));

            memory
                .progress
                .module_stats
                .entry(module.as_str().to_string())
                .or_default()
                .record_score(score);

            match self.store.save_memory(&memory).await {
                Ok(_) => return Ok(()),
                Err(StoreError::Conflict { .. }) => {
                    warn!(learner = %learner, "memory version conflict on module average, re-reading");
                    last_err = Some(StoreError::Backend(
                        "module average update lost the compare-and-swap race".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .unwrap_or_else(|| StoreError::Backend("module average update failed".to_string()))
            .into())
    }
}

impl std::fmt::Debug for AssessmentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssessmentService").finish_non_exhaustive()
    }
}
