//! Engine scores: centipawns or forced mate, never silently conflated.

use serde::{Deserialize, Serialize};

/// An oracle verdict for one position, from the side to move's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Score {
    /// Centipawn evaluation.
    Cp(i32),
    /// Forced mate in N moves; negative means the side to move gets mated.
    Mate(i32),
}

impl Score {
    pub fn is_mate(self) -> bool {
        matches!(self, Score::Mate(_))
    }

    /// Map to bounded centipawns for loss arithmetic. Mate-in-N lands just
    /// inside `±sentinel`, nearer mates scoring higher, so comparisons stay
    /// total without ever producing an unbounded value.
    pub fn to_bounded_cp(self, sentinel: i32) -> i32 {
        match self {
            Score::Cp(cp) => cp,
            Score::Mate(n) if n > 0 => sentinel - n * 10,
            Score::Mate(n) => -sentinel - n * 10,
        }
    }
}

/// Flip a side-to-move score to White's perspective.
pub fn to_white_cp(score: Score, white_to_move: bool, sentinel: i32) -> i32 {
    let cp = score.to_bounded_cp(sentinel);
    if white_to_move {
        cp
    } else {
        -cp
    }
}
