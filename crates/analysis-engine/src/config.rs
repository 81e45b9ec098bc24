//! Analysis configuration from environment variables with sane defaults.
//!
//! Every policy number here (classification ladder, tactic gain bar, mate
//! sentinel, loss cap) is a tunable, not a baked-in literal.

use std::env;
use std::time::Duration;

/// Centipawn-loss ladder separating move-quality buckets. A loss strictly
/// below `excellent` is excellent, below `good` is good, and so on; at or
/// above `mistake` the move is a blunder. `best` additionally requires the
/// played move to equal the engine's move.
#[derive(Clone, Copy, Debug)]
pub struct QualityThresholds {
    pub best: i32,
    pub excellent: i32,
    pub good: i32,
    pub inaccuracy: i32,
    pub mistake: i32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            best: 0,
            excellent: 10,
            good: 50,
            inaccuracy: 100,
            mistake: 200,
        }
    }
}

/// Centipawn-loss ladder for blunder severity, independent of the quality
/// ladder: losses below `moderate` are minor, at or above `critical` are
/// critical.
#[derive(Clone, Copy, Debug)]
pub struct SeverityThresholds {
    pub moderate: i32,
    pub major: i32,
    pub critical: i32,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            moderate: 150,
            major: 300,
            critical: 600,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    /// Path to the UCI engine binary.
    pub engine_path: String,

    /// Search depth per position.
    pub search_depth: u32,

    /// Ranked candidate lines requested when alternatives are enabled.
    pub max_alternative_lines: u32,

    /// Plies kept per alternative line.
    pub alternative_line_plies: usize,

    /// Timeout for a single oracle call.
    pub eval_timeout: Duration,

    /// Treat recoverable per-ply errors (illegal move, oracle timeout)
    /// as fatal for the run.
    pub fail_fast: bool,

    /// Magnitude mate scores map into; larger than any realistic
    /// centipawn evaluation.
    pub mate_sentinel: i32,

    /// Cap on a single move's centipawn loss.
    pub max_centipawn_loss: i32,

    /// Minimum evaluation swing for a tactic to be worth flagging.
    pub min_tactic_gain: i32,

    pub quality: QualityThresholds,
    pub severity: SeverityThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            engine_path: "/usr/local/bin/stockfish".to_string(),
            search_depth: 15,
            max_alternative_lines: 10,
            alternative_line_plies: 5,
            eval_timeout: Duration::from_secs(30),
            fail_fast: false,
            mate_sentinel: 10_000,
            max_centipawn_loss: 500,
            min_tactic_gain: 100,
            quality: QualityThresholds::default(),
            severity: SeverityThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from the environment, falling back to defaults
    /// for anything unset or unparseable. The quality and severity ladders
    /// are code-level policy shared by every deployment; they stay at
    /// their defaults here and are overridden per instance in code or in
    /// tests.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
            env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        Self {
            engine_path: env::var("STOCKFISH_PATH").unwrap_or(defaults.engine_path),
            search_depth: parse_env("ANALYSIS_DEPTH", defaults.search_depth),
            max_alternative_lines: parse_env("MAX_ALTERNATIVE_LINES", defaults.max_alternative_lines),
            alternative_line_plies: parse_env("ALTERNATIVE_LINE_PLIES", defaults.alternative_line_plies),
            eval_timeout: Duration::from_secs(parse_env("EVAL_TIMEOUT_SECS", 30)),
            fail_fast: env::var("ANALYSIS_FAIL_FAST").is_ok(),
            mate_sentinel: parse_env("MATE_SENTINEL", defaults.mate_sentinel),
            max_centipawn_loss: parse_env("MAX_CP_LOSS", defaults.max_centipawn_loss),
            min_tactic_gain: parse_env("MIN_TACTIC_GAIN", defaults.min_tactic_gain),
            quality: defaults.quality,
            severity: defaults.severity,
        }
    }
}
