//! Tactical motif detection on the position the engine's best move leads
//! to: forks, pins, skewers and discovered attacks, with a generic
//! fallback when the gain is real but matches no named motif.

use chess::{BitBoard, Board, ChessMove, Color, Piece, Square, EMPTY};
use chess_board::geometry::{
    attacked_enemy_pieces, attacks_from, is_hanging, is_in_bad_spot, piece_behind,
};
use chess_board::values::{is_slider, piece_name, piece_value, target_value, KNIGHT_VALUE};
use chess_board::{parse_san, parse_uci};

use crate::types::{TacticFinding, TacticKind};

/// Was a tactical motif available from this position? `board` is the
/// position before the move, `best_uci` the engine's choice from it and
/// `eval_gain` the swing (mover's perspective, centipawns) the engine
/// move promised over the move played. Gains below `min_gain` are noise.
pub fn detect_opportunity(
    board: &Board,
    played_san: &str,
    best_uci: &str,
    eval_gain: i32,
    min_gain: i32,
) -> Option<TacticFinding> {
    if eval_gain < min_gain {
        return None;
    }
    let best = parse_uci(best_uci)?;
    if !board.legal(best) {
        return None;
    }

    let mover = board.side_to_move();
    let was_found = parse_san(board, played_san).is_ok_and(|m| m == best);
    let after = board.make_move_new(best);
    let dest = best.get_dest();
    let moved_piece = after.piece_on(dest)?;

    let finding = detect_fork(&after, dest, moved_piece, mover)
        .or_else(|| detect_pin_or_skewer(&after, dest, mover))
        .or_else(|| detect_discovered_attack(board, &after, best, mover))
        .unwrap_or_else(|| PartialFinding {
            kind: TacticKind::TacticalSequence,
            attacker: dest,
            attacker_piece: moved_piece,
            targets: Vec::new(),
            description: format!(
                "{} to {dest} begins a sequence winning {eval_gain} centipawns",
                piece_name(moved_piece)
            ),
        });

    Some(TacticFinding {
        kind: finding.kind,
        attacking_piece: piece_name(finding.attacker_piece).to_string(),
        attacker_square: finding.attacker.to_string(),
        target_squares: finding.targets.iter().map(Square::to_string).collect(),
        was_found,
        eval_gain,
        description: finding.description,
    })
}

struct PartialFinding {
    kind: TacticKind,
    attacker: Square,
    attacker_piece: Piece,
    targets: Vec<Square>,
    description: String,
}

/// The moved piece attacks two or more worthwhile targets and is not
/// itself en prise. Pawns never count as fork targets.
fn detect_fork(
    after: &Board,
    dest: Square,
    moved_piece: Piece,
    mover: Color,
) -> Option<PartialFinding> {
    if moved_piece == Piece::King || is_in_bad_spot(after, dest) {
        return None;
    }
    let targets: Vec<Square> = attacked_enemy_pieces(after, dest, mover)
        .into_iter()
        .filter(|&(piece, sq)| {
            piece != Piece::Pawn
                && (target_value(piece) > target_value(moved_piece)
                    || is_hanging(after, !mover, sq))
        })
        .map(|(_, sq)| sq)
        .collect();
    if targets.len() < 2 {
        return None;
    }
    let description = format!(
        "{} on {dest} forks {} pieces",
        piece_name(moved_piece),
        targets.len()
    );
    Some(PartialFinding {
        kind: TacticKind::Fork,
        attacker: dest,
        attacker_piece: moved_piece,
        targets,
        description,
    })
}

/// A slider lined up against two enemy pieces on one ray. Pin when the
/// front piece is the lesser one, skewer when the front piece is the
/// greater and the back piece is still worth winning. The moved piece is
/// examined first so the motif is attributed to the move when possible.
fn detect_pin_or_skewer(after: &Board, dest: Square, mover: Color) -> Option<PartialFinding> {
    let mut skewer = None;

    for slider_sq in own_sliders_front_loaded(after, dest, mover) {
        let slider = match after.piece_on(slider_sq) {
            Some(p) => p,
            None => continue,
        };
        for (front, front_sq) in attacked_enemy_pieces(after, slider_sq, mover) {
            let (back_sq, back, back_color) = match piece_behind(after, slider_sq, front_sq) {
                Some(hit) => hit,
                None => continue,
            };
            if back_color == mover {
                continue;
            }
            if target_value(front) < target_value(back) {
                return Some(PartialFinding {
                    kind: TacticKind::Pin,
                    attacker: slider_sq,
                    attacker_piece: slider,
                    targets: vec![front_sq, back_sq],
                    description: format!(
                        "{} on {slider_sq} pins the {} on {front_sq} against the {} on {back_sq}",
                        piece_name(slider),
                        piece_name(front),
                        piece_name(back)
                    ),
                });
            }
            if skewer.is_none()
                && target_value(front) > target_value(back)
                && target_value(back) >= KNIGHT_VALUE
            {
                skewer = Some(PartialFinding {
                    kind: TacticKind::Skewer,
                    attacker: slider_sq,
                    attacker_piece: slider,
                    targets: vec![front_sq, back_sq],
                    description: format!(
                        "{} on {slider_sq} skewers the {} on {front_sq} to the {} on {back_sq}",
                        piece_name(slider),
                        piece_name(front),
                        piece_name(back)
                    ),
                });
            }
        }
    }
    skewer
}

/// Moving away from `source` unmasked a slider's attack on a major target.
fn detect_discovered_attack(
    before: &Board,
    after: &Board,
    best: ChessMove,
    mover: Color,
) -> Option<PartialFinding> {
    let source = best.get_source();
    for slider_sq in own_sliders_front_loaded(after, best.get_dest(), mover) {
        if slider_sq == best.get_dest() {
            continue;
        }
        let slider = match after.piece_on(slider_sq) {
            Some(p) => p,
            None => continue,
        };
        for (target, target_sq) in attacked_enemy_pieces(after, slider_sq, mover) {
            if target != Piece::King && piece_value(target) < KNIGHT_VALUE {
                continue;
            }
            // The attack must be new, and the vacated square must be the
            // one that was masking it.
            let was_attacked =
                (attacks_from(before, slider_sq) & BitBoard::from_square(target_sq)) != EMPTY;
            let unmasked =
                (chess::between(slider_sq, target_sq) & BitBoard::from_square(source)) != EMPTY;
            if !was_attacked && unmasked {
                let description = format!(
                    "moving from {source} uncovers the {} on {slider_sq} against the {} on {target_sq}",
                    piece_name(slider),
                    piece_name(target)
                );
                return Some(PartialFinding {
                    kind: TacticKind::DiscoveredAttack,
                    attacker: slider_sq,
                    attacker_piece: slider,
                    targets: vec![target_sq],
                    description,
                });
            }
        }
    }
    None
}

/// The mover's sliders, with the just-moved piece (if a slider) first.
fn own_sliders_front_loaded(after: &Board, dest: Square, mover: Color) -> Vec<Square> {
    let mut squares: Vec<Square> = (*after.color_combined(mover))
        .into_iter()
        .filter(|&sq| after.piece_on(sq).is_some_and(is_slider))
        .collect();
    if let Some(pos) = squares.iter().position(|&sq| sq == dest) {
        squares.swap(0, pos);
    }
    squares
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const GAIN: i32 = 300;
    const MIN_GAIN: i32 = 100;

    #[test]
    fn royal_knight_fork_detected() {
        // Nc7+ forks the king on e8 and the rook on a8.
        let board = Board::from_str("r3k3/8/8/3N4/8/8/8/4K3 w - - 0 1").unwrap();
        let finding = detect_opportunity(&board, "Nb6", "d5c7", GAIN, MIN_GAIN).unwrap();
        assert_eq!(finding.kind, TacticKind::Fork);
        assert_eq!(finding.attacking_piece, "knight");
        assert_eq!(finding.attacker_square, "c7");
        assert!(finding.target_squares.contains(&"e8".to_string()));
        assert!(finding.target_squares.contains(&"a8".to_string()));
        assert!(!finding.was_found);
        assert_eq!(finding.eval_gain, GAIN);
    }

    #[test]
    fn played_motif_move_is_marked_found() {
        let board = Board::from_str("r3k3/8/8/3N4/8/8/8/4K3 w - - 0 1").unwrap();
        let finding = detect_opportunity(&board, "Nc7+", "d5c7", GAIN, MIN_GAIN).unwrap();
        assert!(finding.was_found);
    }

    #[test]
    fn bishop_pin_against_queen() {
        // After 1.d4 d5 2.c4 e6 3.Nc3 Nf6, Bg5 pins the f6 knight.
        let board = Board::from_str(
            "rnbqkb1r/ppp2ppp/4pn2/3p4/2PP4/2N5/PP2PPPP/R1BQKBNR w KQkq - 0 4",
        )
        .unwrap();
        let finding = detect_opportunity(&board, "e3", "c1g5", GAIN, MIN_GAIN).unwrap();
        assert_eq!(finding.kind, TacticKind::Pin);
        assert_eq!(finding.attacking_piece, "bishop");
        assert_eq!(finding.attacker_square, "g5");
        assert_eq!(finding.target_squares, vec!["f6", "d8"]);
    }

    #[test]
    fn rook_check_skewers_king_to_rook() {
        // Re1+ forces the e5 king off the file, winning the e8 rook.
        let board = Board::from_str("4r3/8/8/4k3/8/8/8/R6K w - - 0 1").unwrap();
        let finding = detect_opportunity(&board, "Kg2", "a1e1", GAIN, MIN_GAIN).unwrap();
        assert_eq!(finding.kind, TacticKind::Skewer);
        assert_eq!(finding.attacker_square, "e1");
        assert_eq!(finding.target_squares, vec!["e5", "e8"]);
    }

    #[test]
    fn knight_retreat_uncovers_bishop_on_queen() {
        let board = Board::from_str("6k1/6q1/8/8/3N4/8/1B6/7K w - - 0 1").unwrap();
        let finding = detect_opportunity(&board, "Nc2", "d4b5", GAIN, MIN_GAIN).unwrap();
        assert_eq!(finding.kind, TacticKind::DiscoveredAttack);
        assert_eq!(finding.attacking_piece, "bishop");
        assert_eq!(finding.attacker_square, "b2");
        assert_eq!(finding.target_squares, vec!["g7"]);
    }

    #[test]
    fn quiet_gain_falls_back_to_sequence() {
        let board = Board::default();
        let finding = detect_opportunity(&board, "e4", "e2e4", GAIN, MIN_GAIN).unwrap();
        assert_eq!(finding.kind, TacticKind::TacticalSequence);
        assert!(finding.was_found);
        assert!(finding.target_squares.is_empty());
    }

    #[test]
    fn small_gain_is_not_a_tactic() {
        let board = Board::from_str("r3k3/8/8/3N4/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(detect_opportunity(&board, "Nb6", "d5c7", 40, MIN_GAIN).is_none());
    }

    #[test]
    fn knights_and_pawns_never_pin_or_skewer() {
        // Knights and pawns only; no ray piece exists to pin with.
        let board = Board::from_str("4k3/3r4/8/3N4/8/2P5/8/4K3 w - - 0 1").unwrap();
        for mv in chess::MoveGen::new_legal(&board) {
            let uci = chess_board::move_to_uci(mv);
            if let Some(finding) = detect_opportunity(&board, "Kd1", &uci, GAIN, MIN_GAIN) {
                assert!(
                    !matches!(finding.kind, TacticKind::Pin | TacticKind::Skewer),
                    "{uci} produced {:?}",
                    finding.kind
                );
            }
        }
    }

    #[test]
    fn illegal_best_move_is_rejected() {
        let board = Board::default();
        assert!(detect_opportunity(&board, "e4", "e2e5", GAIN, MIN_GAIN).is_none());
        assert!(detect_opportunity(&board, "e4", "zz", GAIN, MIN_GAIN).is_none());
    }
}
