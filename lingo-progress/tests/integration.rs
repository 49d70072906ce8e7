//! End-to-end flows over the in-memory stores: session lifecycle, error
//! tracking, assessment, progression, and the composed summary.

use std::sync::Arc;

use chrono::Duration;

use lingo_core::{
    CefrLevel, ErrorCategory, ErrorLogEntry, EventKind, LanguageCode, LearnerId,
    MemoryProgressStore, ModuleId, ProgressStore, SessionEvent, SessionId, SessionManager,
};
use lingo_progress::{
    AssessmentService, ErrorPatternTracker, MemoryAssessmentStore, MemoryCurriculumStore,
    ProgressionEngine, RecommendationKind, ReviewRecommender, SummaryService,
};

struct Stack {
    store: Arc<MemoryProgressStore>,
    manager: SessionManager,
    tracker: ErrorPatternTracker,
    assessments: Arc<AssessmentService>,
    progression: Arc<ProgressionEngine>,
    summary: SummaryService,
}

fn stack() -> Stack {
    let store = Arc::new(MemoryProgressStore::new());
    let assessment_store = Arc::new(MemoryAssessmentStore::new());
    let recommender = Arc::new(ReviewRecommender::new(
        store.clone(),
        Arc::new(MemoryCurriculumStore::new()),
    ));
    let assessments = Arc::new(AssessmentService::new(
        store.clone(),
        assessment_store.clone(),
        recommender.clone(),
    ));
    let progression = Arc::new(ProgressionEngine::new(
        store.clone(),
        assessment_store,
    ));
    let summary = SummaryService::new(
        store.clone(),
        assessments.clone(),
        progression.clone(),
        recommender,
    );
    Stack {
        manager: SessionManager::new(store.clone()),
        tracker: ErrorPatternTracker::new(store.clone()),
        store,
        assessments,
        progression,
        summary,
    }
}

fn learner() -> LearnerId {
    LearnerId::new("ana")
}

fn language() -> LanguageCode {
    LanguageCode::new("es")
}

/// Run one well-paced, polite practice session and return its ID.
async fn run_clean_session(stack: &Stack) -> SessionId {
    let session = stack
        .manager
        .create_session(learner(), language(), None)
        .await
        .unwrap();
    let start = session.started_at;

    let texts = [
        "could you tell me about the market near the station please",
        "i have been practicing my ordering phrases every single day",
        "however i still mix up the past tenses sometimes",
        "i would have visited the museum if i had known it was open",
        "thank you for the correction that makes much more sense now",
        "moreover i want to try describing my whole week next time",
    ];
    for (i, text) in texts.iter().enumerate() {
        stack
            .manager
            .append_event(
                session.id,
                SessionEvent::message(EventKind::UserMessage, *text)
                    .at(start + Duration::seconds(10 * (i as i64 + 1))),
            )
            .await
            .unwrap();
    }
    stack
        .manager
        .append_event(
            session.id,
            SessionEvent::new(EventKind::ActivityStart).at(start + Duration::seconds(65)),
        )
        .await
        .unwrap();
    stack
        .manager
        .append_event(
            session.id,
            SessionEvent::new(EventKind::ActivityComplete).at(start + Duration::seconds(70)),
        )
        .await
        .unwrap();

    stack.manager.complete(session.id).await.unwrap();
    session.id
}

#[tokio::test]
async fn session_to_assessment_to_summary() {
    let stack = stack();

    let session = stack
        .manager
        .create_session(learner(), language(), None)
        .await
        .unwrap();
    let start = session.started_at;
    for (i, text) in ["yo es feliz hoy", "ayer yo es en el mercado", "gracias por la ayuda"]
        .iter()
        .enumerate()
    {
        stack
            .manager
            .append_event(
                session.id,
                SessionEvent::message(EventKind::UserMessage, *text)
                    .at(start + Duration::seconds(10 * (i as i64 + 1))),
            )
            .await
            .unwrap();
    }

    // Two detections of the same conjugation mistake
    for context in ["yo es feliz hoy", "ayer yo es en el mercado"] {
        stack
            .tracker
            .record_error(
                ErrorLogEntry::new(learner(), language(), ErrorCategory::Grammar, context)
                    .with_session(session.id)
                    .with_subcategory("ser_estar"),
            )
            .await
            .unwrap();
    }

    let metrics = stack.manager.complete(session.id).await.unwrap();
    assert_eq!(metrics.user_messages, 3);

    let assessment = stack
        .assessments
        .assess_session(session.id, None)
        .await
        .unwrap();
    assert!(assessment.scores.overall > 0.0);
    // The logged errors drag grammar accuracy below a clean session's
    assert!(assessment.scores.accuracy.components.grammar_accuracy < 100.0);

    let summary = stack
        .summary
        .summarize(&learner(), &language())
        .await
        .unwrap();
    assert_eq!(summary.sessions_completed, 1);
    assert_eq!(summary.streak_days, 1);
    assert_eq!(summary.level, CefrLevel::A2);
    // The fresh pattern leads the focus areas and the recommendations
    assert_eq!(
        summary.focus.primary.as_ref().map(|k| k.label()),
        Some("grammar/ser_estar".to_string())
    );
    assert!(summary
        .recommendations
        .iter()
        .any(|r| r.kind == RecommendationKind::Skill && r.target == "grammar/ser_estar"));
    // Session completion reset the recent counter without losing history
    let patterns = stack
        .tracker
        .patterns(&learner(), &language())
        .await
        .unwrap();
    assert_eq!(patterns[0].frequency, 2);
    assert_eq!(patterns[0].recent_count, 0);
}

#[tokio::test]
async fn consistent_strong_learner_advances_a_level() {
    let stack = stack();

    for _ in 0..3 {
        let session_id = run_clean_session(&stack).await;
        stack
            .assessments
            .assess_session(session_id, None)
            .await
            .unwrap();
    }

    // Not eligible yet: the A2 modules are still open
    let evaluation = stack
        .progression
        .evaluate(&learner(), &language())
        .await
        .unwrap();
    assert!(!evaluation.eligible);
    assert!(evaluation
        .blockers
        .iter()
        .all(|b| b.contains("not yet completed")));

    // Finish the required modules
    let mut memory = stack
        .store
        .get_memory(&learner(), &language())
        .await
        .unwrap()
        .unwrap();
    memory.progress.completed_modules =
        vec![ModuleId::new("foundations-1"), ModuleId::new("foundations-2")];
    stack.store.save_memory(&memory).await.unwrap();

    let new_level = stack
        .progression
        .advance(&learner(), &language())
        .await
        .unwrap();
    assert_eq!(new_level, CefrLevel::B1);

    let summary = stack
        .summary
        .summarize(&learner(), &language())
        .await
        .unwrap();
    assert_eq!(summary.level, CefrLevel::B1);
    assert_eq!(summary.sessions_completed, 3);
    // Three same-day completions hold a one-day streak
    assert_eq!(summary.streak_days, 1);
    // The next evaluation is judged against the higher B1 bars
    assert_eq!(summary.progression.current_level, CefrLevel::B1);
}

#[tokio::test]
async fn assessment_history_feeds_rolling_averages() {
    let stack = stack();

    for _ in 0..2 {
        let session_id = run_clean_session(&stack).await;
        stack
            .assessments
            .assess_session(session_id, None)
            .await
            .unwrap();
    }

    let averages = stack
        .assessments
        .rolling_averages(&learner(), &language())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(averages.assessments, 2);
    assert!(averages.overall > 50.0);
    assert!(averages.fluency > 50.0);
    assert!(averages.confidence > 50.0);
}
