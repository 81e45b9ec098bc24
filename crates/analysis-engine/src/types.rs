//! Output records produced by the analysis pipeline.
//!
//! Everything here is created once per analysis pass and immutable
//! afterward; the pipeline is the sole writer.

use chess::Color;
use serde::{Deserialize, Serialize};

use crate::score::Score;

/// The oracle's verdict for one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Engine's preferred move, UCI notation.
    pub best_move: String,
    pub score: Score,
    pub depth: u32,
}

/// One ranked candidate line. Rank 1 is always the engine's best move;
/// ordering is the engine's, never re-sorted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeLine {
    pub rank: u32,
    #[serde(rename = "move")]
    pub move_uci: String,
    pub score: Score,
    pub depth: u32,
    pub principal_variation: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    White,
    Black,
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

/// Move-quality label. Exactly one applies per ply; the `is_*` accessors
/// are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveQuality {
    Best,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
    Book,
}

impl MoveQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            MoveQuality::Best => "best",
            MoveQuality::Excellent => "excellent",
            MoveQuality::Good => "good",
            MoveQuality::Inaccuracy => "inaccuracy",
            MoveQuality::Mistake => "mistake",
            MoveQuality::Blunder => "blunder",
            MoveQuality::Book => "book",
        }
    }

    pub fn is_inaccuracy(self) -> bool {
        self == MoveQuality::Inaccuracy
    }

    pub fn is_mistake(self) -> bool {
        self == MoveQuality::Mistake
    }

    pub fn is_blunder(self) -> bool {
        self == MoveQuality::Blunder
    }

    /// Poor enough to run the tactical detectors and the categorizer.
    pub fn needs_review(self) -> bool {
        matches!(
            self,
            MoveQuality::Inaccuracy | MoveQuality::Mistake | MoveQuality::Blunder
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TacticKind {
    Fork,
    Pin,
    Skewer,
    DiscoveredAttack,
    TacticalSequence,
}

impl TacticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TacticKind::Fork => "fork",
            TacticKind::Pin => "pin",
            TacticKind::Skewer => "skewer",
            TacticKind::DiscoveredAttack => "discovered_attack",
            TacticKind::TacticalSequence => "tactical_sequence",
        }
    }
}

/// A tactical motif available from the analyzed position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TacticFinding {
    pub kind: TacticKind,
    /// Piece executing the motif, e.g. "knight".
    pub attacking_piece: String,
    pub attacker_square: String,
    pub target_squares: Vec<String>,
    /// True when the played move was exactly the motif move. Identity is
    /// by move, not by material outcome.
    pub was_found: bool,
    pub eval_gain: i32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreePieceEntry {
    pub piece: String,
    pub square: String,
    pub value: i32,
}

/// Opponent material left capturable at a net gain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreePieceFinding {
    /// Most valuable free piece.
    pub piece: String,
    pub square: String,
    pub value: i32,
    /// Played move captured it (exact square match).
    pub was_captured: bool,
    pub played_move: String,
    pub all_free_pieces: Vec<FreePieceEntry>,
    /// UCI of the highest-ranked alternative line that captures it, if any.
    pub capturing_alternative: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Opening,
    Middlegame,
    Endgame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Moderate,
    Major,
    Critical,
}

/// Structured explanation attached to inaccuracies, mistakes and blunders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categorization {
    pub phase: GamePhase,
    pub tactical_theme: String,
    pub position_type: String,
    pub severity: Severity,
    pub difficulty_level: u8,
}

/// Per-ply analysis record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveAnalysis {
    /// 1-based position in the input move list (aligned with `PlyError`).
    pub ply: usize,
    /// Full-move counter over the plies actually played; skipped plies do
    /// not advance it.
    pub move_number: u32,
    pub side: Side,
    pub san: String,
    #[serde(rename = "move")]
    pub move_uci: String,
    pub position_before: String,
    pub position_after: String,
    pub evaluation_before: EvaluationResult,
    pub evaluation_after: EvaluationResult,
    pub centipawn_loss: i32,
    pub quality: MoveQuality,
    /// Only one legal reply existed.
    pub forced: bool,
    pub alternatives: Vec<AlternativeLine>,
    pub tactic: Option<TacticFinding>,
    pub free_piece: Option<FreePieceFinding>,
    /// Present iff `quality` is inaccuracy/mistake/blunder.
    pub categorization: Option<Categorization>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityCounts {
    pub best: u32,
    pub excellent: u32,
    pub good: u32,
    pub inaccuracy: u32,
    pub mistake: u32,
    pub blunder: u32,
    pub book: u32,
    pub forced: u32,
}

impl QualityCounts {
    pub fn record(&mut self, quality: MoveQuality, forced: bool) {
        if forced {
            self.forced += 1;
            return;
        }
        match quality {
            MoveQuality::Best => self.best += 1,
            MoveQuality::Excellent => self.excellent += 1,
            MoveQuality::Good => self.good += 1,
            MoveQuality::Inaccuracy => self.inaccuracy += 1,
            MoveQuality::Mistake => self.mistake += 1,
            MoveQuality::Blunder => self.blunder += 1,
            MoveQuality::Book => self.book += 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SideBreakdown {
    pub accuracy: f64,
    pub avg_centipawn_loss: f64,
    pub counts: QualityCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    pub analyzed_moves: u32,
    pub skipped_moves: u32,
    pub blunders: u32,
    /// Overall accuracy, always within [0, 100].
    pub accuracy: f64,
    pub avg_centipawn_loss: f64,
    pub white: SideBreakdown,
    pub black: SideBreakdown,
}

/// A ply that could not be analyzed (invalid notation, oracle timeout).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlyError {
    /// 1-based position in the input move list.
    pub ply: usize,
    pub san: String,
    pub reason: String,
}

/// Best-effort result of a full game analysis: a partially analyzed game
/// is still a valid result, with the gaps listed in `errors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub moves: Vec<MoveAnalysis>,
    pub summary: GameSummary,
    pub errors: Vec<PlyError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_QUALITIES: [MoveQuality; 7] = [
        MoveQuality::Best,
        MoveQuality::Excellent,
        MoveQuality::Good,
        MoveQuality::Inaccuracy,
        MoveQuality::Mistake,
        MoveQuality::Blunder,
        MoveQuality::Book,
    ];

    #[test]
    fn quality_flags_are_mutually_exclusive() {
        for quality in ALL_QUALITIES {
            let raised = [
                quality.is_inaccuracy(),
                quality.is_mistake(),
                quality.is_blunder(),
            ]
            .iter()
            .filter(|&&flag| flag)
            .count();
            assert!(raised <= 1, "{quality:?} raises more than one flag");
            assert_eq!(raised == 1, quality.needs_review());
        }
    }

    #[test]
    fn counts_record_each_quality_once() {
        let mut counts = QualityCounts::default();
        for quality in ALL_QUALITIES {
            counts.record(quality, false);
        }
        counts.record(MoveQuality::Best, true);
        assert_eq!(counts.best, 1);
        assert_eq!(counts.excellent, 1);
        assert_eq!(counts.blunder, 1);
        assert_eq!(counts.book, 1);
        assert_eq!(counts.forced, 1);
    }

    #[test]
    fn serialized_record_uses_move_key() {
        let line = AlternativeLine {
            rank: 1,
            move_uci: "e2e4".to_string(),
            score: Score::Cp(30),
            depth: 15,
            principal_variation: vec!["e2e4".to_string()],
        };
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["move"], "e2e4");
        assert_eq!(json["score"]["kind"], "cp");
    }
}
