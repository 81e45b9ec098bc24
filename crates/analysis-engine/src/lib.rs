//! Chess game analysis engine.
//!
//! Replays a game move by move, asks a UCI oracle for evaluations,
//! classifies each move on a centipawn-loss ladder, and enriches poor
//! moves with tactical findings (forks, pins, skewers, discovered
//! attacks), free-piece audits and a deterministic categorization.

pub mod book;
pub mod categorize;
pub mod config;
pub mod error;
pub mod eval;
pub mod free_piece;
pub mod oracle;
pub mod pipeline;
pub mod pool;
pub mod score;
pub mod tactics;
pub mod types;

pub use book::{NoBook, OpeningBook};
pub use config::{AnalysisConfig, QualityThresholds, SeverityThresholds};
pub use error::AnalysisError;
pub use oracle::{Oracle, StockfishOracle};
pub use pipeline::{CancelFlag, GameAnalyzer};
pub use pool::{OracleLease, OraclePool};
pub use score::Score;
pub use types::{
    AlternativeLine, AnalysisResult, Categorization, EvaluationResult, FreePieceFinding,
    GamePhase, GameSummary, MoveAnalysis, MoveQuality, Severity, Side, TacticFinding, TacticKind,
};
