//! Error types for lingo-progress

use thiserror::Error;

use lingo_core::{SessionError, StoreError};

/// Top-level error type for lingo-progress
#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot advance: {0}")]
    CannotAdvance(String),

    #[error("Invalid heuristics config: {0}")]
    HeuristicsConfig(#[from] toml::de::Error),

    #[error("Invalid heuristic pattern: {0}")]
    HeuristicsPattern(#[from] regex::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProgressError>;
