//! Engine error taxonomy.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Nothing to analyze; surfaced before any oracle call.
    #[error("empty move list")]
    EmptyGame,

    /// Only returned in fail-fast runs; otherwise illegal plies are
    /// skipped and reported in the result's error list.
    #[error("illegal move '{san}' at ply {ply}: {reason}")]
    IllegalMove {
        ply: usize,
        san: String,
        reason: String,
    },

    #[error("oracle error: {0}")]
    Engine(String),

    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle is not ready")]
    NotReady,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("analysis cancelled")]
    Cancelled,
}
