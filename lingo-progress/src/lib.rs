//! lingo-progress: scoring, patterns, and progression for the lingo
//! learner-progress engine
//!
//! Built on the session substrate in `lingo-core`, this crate provides:
//!
//! - **Scoring** - the four-dimension engine ([`ScoreSet`]) with swappable
//!   [`ScoringHeuristics`]
//! - **Pattern tracking** - [`ErrorPatternTracker`] folding errors into
//!   trend-annotated patterns and [`FocusAreas`]
//! - **Assessments** - [`AssessmentService`] freezing scoring passes and
//!   maintaining rolling averages
//! - **Progression** - [`ProgressionEngine`] judging and applying CEFR
//!   level advancement against [`CompetencyTable`] thresholds
//! - **Recommendations** - [`ReviewRecommender`] prioritizing what to
//!   revisit
//! - **Summary** - [`SummaryService`] composing it all into one document

pub mod assessment;
pub mod error;
pub mod patterns;
pub mod progression;
pub mod recommend;
pub mod scoring;
pub mod summary;

// Re-export key types for convenience
pub use assessment::{
    Assessment, AssessmentKind, AssessmentService, AssessmentStore, MemoryAssessmentStore,
    RollingAverages,
};
pub use error::{ProgressError, Result};
pub use patterns::{
    classify_trend, focus_areas, update_trends, ErrorPatternTracker, FocusAreas,
};
pub use progression::{
    CompetencyProgress, CompetencyTable, CompetencyThreshold, ProgressionEngine,
    ProgressionEvaluation,
};
pub use recommend::{
    CurriculumStore, MemoryCurriculumStore, Priority, Recommendation, RecommendationKind,
    ReviewRecommender,
};
pub use scoring::{
    score_accuracy, score_appropriacy, score_confidence, score_fluency, AccuracyComponents,
    AccuracyScore, AppropriacyComponents, AppropriacyScore, ConfidenceComponents, ConfidenceScore,
    FluencyComponents, FluencyScore, HeuristicPatterns, ScoreInput, ScoreSet, ScoringHeuristics,
    UserMessage,
};
pub use summary::{ProgressSummary, SummaryService};
