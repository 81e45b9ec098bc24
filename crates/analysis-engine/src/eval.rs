//! Scoring policy: centipawn loss, mate-blunder detection, quality
//! bucketing and accuracy. Pure functions only, applied identically for
//! both colors.

use crate::config::QualityThresholds;
use crate::types::MoveQuality;

/// Is this white-perspective value a mapped mate score? Anything within
/// 1000 cp of the sentinel can only come from `Score::Mate`.
pub fn is_mate_cp(white_cp: i32, sentinel: i32) -> bool {
    white_cp.abs() > sentinel - 1000
}

/// The mover threw away a forced mate, or walked into one from a
/// non-mate position. Delivering mate is never a mate blunder.
pub fn is_mate_blunder(
    best_white_cp: i32,
    after_white_cp: i32,
    mover_is_white: bool,
    opponent_mated: bool,
    sentinel: i32,
) -> bool {
    if opponent_mated {
        return false;
    }
    let best_is_mate = is_mate_cp(best_white_cp, sentinel);
    let after_is_mate = is_mate_cp(after_white_cp, sentinel);

    if best_is_mate && !after_is_mate {
        return true;
    }
    if !best_is_mate && after_is_mate {
        // Only a blunder when the mate now runs against the mover.
        return if mover_is_white {
            after_white_cp < 0
        } else {
            after_white_cp > 0
        };
    }
    false
}

/// Capped, never-negative centipawn loss from the mover's perspective.
/// Both inputs are white-perspective values.
pub fn centipawn_loss(
    best_white_cp: i32,
    after_white_cp: i32,
    mover_is_white: bool,
    opponent_mated: bool,
    max_loss: i32,
    sentinel: i32,
) -> i32 {
    if opponent_mated {
        return 0;
    }
    let best_is_mate = is_mate_cp(best_white_cp, sentinel);
    let after_is_mate = is_mate_cp(after_white_cp, sentinel);

    if best_is_mate && after_is_mate {
        // Same winner: still a mate, no measurable loss. Winner flipped:
        // worst case, capped.
        return if (best_white_cp > 0) == (after_white_cp > 0) {
            0
        } else {
            max_loss
        };
    }

    let loss = if mover_is_white {
        best_white_cp - after_white_cp
    } else {
        after_white_cp - best_white_cp
    };
    loss.clamp(0, max_loss)
}

/// Monotonic bucketing of centipawn loss. `best` is reserved for the
/// engine's own move; a zero-loss alternative is merely excellent.
pub fn classify(
    cp_loss: i32,
    played_engine_move: bool,
    mate_blunder: bool,
    t: &QualityThresholds,
) -> MoveQuality {
    if mate_blunder {
        return MoveQuality::Blunder;
    }
    if cp_loss <= t.best && played_engine_move {
        MoveQuality::Best
    } else if cp_loss < t.excellent {
        MoveQuality::Excellent
    } else if cp_loss < t.good {
        MoveQuality::Good
    } else if cp_loss < t.inaccuracy {
        MoveQuality::Inaccuracy
    } else if cp_loss < t.mistake {
        MoveQuality::Mistake
    } else {
        MoveQuality::Blunder
    }
}

/// Accuracy in [0, 100], monotone decreasing in average centipawn loss.
pub fn accuracy(total_cp_loss: i64, counted_moves: u32) -> f64 {
    if counted_moves == 0 {
        return 100.0;
    }
    let acpl = total_cp_loss as f64 / counted_moves as f64;
    let accuracy = 100.0 * (1.0 / (1.0 + acpl / 100.0)).sqrt();
    accuracy.clamp(0.0, 100.0)
}
