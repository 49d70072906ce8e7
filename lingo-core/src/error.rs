//! Error types for lingo-core

use thiserror::Error;

use crate::session::SessionStatus;
use crate::types::{LanguageCode, LearnerId, SessionId};

/// Top-level error type for lingo-core
#[derive(Error, Debug)]
pub enum LingoError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors related to session lifecycle and event appending
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("Session {id} is {status} - events can no longer be appended")]
    Terminal { id: SessionId, status: SessionStatus },

    #[error("Learner {learner} already has an active {language} session: {existing}")]
    ActiveSessionExists {
        learner: LearnerId,
        language: LanguageCode,
        existing: SessionId,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the durable store and cache collaborators
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Version conflict on {key}: expected {expected}, found {found}")]
    Conflict {
        key: String,
        expected: u64,
        found: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Malformed input, rejected before any state mutation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}
