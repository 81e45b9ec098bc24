//! Deterministic explanation of a poor move: game phase, tactical theme,
//! position character, severity and difficulty.

use chess::{Board, Piece, EMPTY};
use chess_board::geometry::attackers_of;
use chess_board::values::{pawn_count, piece_count};

use crate::config::SeverityThresholds;
use crate::types::{Categorization, FreePieceFinding, GamePhase, Severity, TacticFinding};

const ENDGAME_PIECE_LIMIT: u32 = 14;
const OPENING_PLY_CAP: usize = 24;

/// Explain a reviewable move. Pure and total: the same inputs always give
/// the same categorization, and every input gets one.
pub fn categorize_blunder(
    board: &Board,
    ply_index: usize,
    total_plies: usize,
    cp_loss: i32,
    tactic: Option<&TacticFinding>,
    free_piece: Option<&FreePieceFinding>,
    severity: &SeverityThresholds,
) -> Categorization {
    let phase = game_phase(board, ply_index, total_plies);
    let tactical_theme = tactical_theme(board, cp_loss, tactic, free_piece);
    let position_type = position_type(board);
    let severity = severity_of(cp_loss, severity);
    let difficulty_level = difficulty(board, tactic, free_piece);

    Categorization {
        phase,
        tactical_theme,
        position_type,
        severity,
        difficulty_level,
    }
}

/// Most conservative categorization: the fallback when categorization
/// itself fails, keeping the record non-null without overstating anything.
pub fn conservative() -> Categorization {
    Categorization {
        phase: GamePhase::Middlegame,
        tactical_theme: "positional_error".to_string(),
        position_type: "semi_open".to_string(),
        severity: Severity::Minor,
        difficulty_level: 1,
    }
}

/// Phase by material first, then by progress through the game. Material
/// dominates so a queen trade on move 8 still reads as an endgame.
fn game_phase(board: &Board, ply_index: usize, total_plies: usize) -> GamePhase {
    if piece_count(board) <= ENDGAME_PIECE_LIMIT {
        return GamePhase::Endgame;
    }
    let opening_end = (total_plies * 3 / 10).min(OPENING_PLY_CAP).max(1);
    if ply_index < opening_end {
        return GamePhase::Opening;
    }
    if total_plies > 0 && ply_index >= total_plies * 8 / 10 {
        return GamePhase::Endgame;
    }
    GamePhase::Middlegame
}

fn tactical_theme(
    board: &Board,
    cp_loss: i32,
    tactic: Option<&TacticFinding>,
    free_piece: Option<&FreePieceFinding>,
) -> String {
    if let Some(tactic) = tactic {
        return if tactic.was_found {
            tactic.kind.as_str().to_string()
        } else {
            format!("missed_{}", tactic.kind.as_str())
        };
    }
    if free_piece.is_some() {
        return "hanging_piece".to_string();
    }
    if king_ring_pressure(board) >= 2 {
        return "king_safety".to_string();
    }
    if cp_loss >= 300 {
        return "bad_piece_placement".to_string();
    }
    "positional_error".to_string()
}

/// Squares around the mover's king attacked by the opponent.
fn king_ring_pressure(board: &Board) -> u32 {
    let mover = board.side_to_move();
    let king_sq = (*board.pieces(Piece::King) & *board.color_combined(mover)).to_square();
    chess::get_king_moves(king_sq)
        .into_iter()
        .filter(|&sq| attackers_of(board, !mover, sq) != EMPTY)
        .count() as u32
}

fn position_type(board: &Board) -> String {
    match pawn_count(board) {
        14.. => "closed".to_string(),
        ..=8 => "open".to_string(),
        _ => "semi_open".to_string(),
    }
}

fn severity_of(cp_loss: i32, t: &SeverityThresholds) -> Severity {
    if cp_loss >= t.critical {
        Severity::Critical
    } else if cp_loss >= t.major {
        Severity::Major
    } else if cp_loss >= t.moderate {
        Severity::Moderate
    } else {
        Severity::Minor
    }
}

/// 1 (obvious) to 5 (hard to see). Named motifs are easier to spot than
/// quiet positional losses; crowded boards hide things, bare ones do not.
fn difficulty(
    board: &Board,
    tactic: Option<&TacticFinding>,
    free_piece: Option<&FreePieceFinding>,
) -> u8 {
    use crate::types::TacticKind;

    let base: i32 = match tactic.map(|t| t.kind) {
        Some(TacticKind::Fork) => 2,
        Some(TacticKind::Pin) | Some(TacticKind::Skewer) => 3,
        Some(TacticKind::DiscoveredAttack) | Some(TacticKind::TacticalSequence) => 4,
        None if free_piece.is_some() => 1,
        None => 4,
    };
    let pieces = piece_count(board);
    let adjusted = if pieces > 26 {
        base + 1
    } else if pieces <= 10 {
        base - 1
    } else {
        base
    };
    adjusted.clamp(1, 5) as u8
}
