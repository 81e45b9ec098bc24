//! Free-piece audit: enemy material that could have been captured at a
//! net gain from the analyzed position.

use chess::{Board, ChessMove, MoveGen, Piece, Square};
use chess_board::values::{piece_name, piece_value};
use chess_board::{is_capture, parse_san, parse_uci};

use crate::types::{AlternativeLine, FreePieceEntry, FreePieceFinding};

/// Survey the position for enemy pieces capturable at a profit. `board`
/// is the position before the move. Returns `None` when nothing was free.
pub fn detect_free_piece(
    board: &Board,
    played_san: &str,
    alternatives: &[AlternativeLine],
) -> Option<FreePieceFinding> {
    let mover = board.side_to_move();
    let enemy = *board.color_combined(!mover);

    let mut free: Vec<(Square, FreePieceEntry)> = Vec::new();
    for sq in enemy {
        let victim = match board.piece_on(sq) {
            Some(Piece::King) | None => continue,
            Some(piece) => piece,
        };
        if net_capture_gain(board, sq, victim).is_some_and(|gain| gain > 0) {
            free.push((
                sq,
                FreePieceEntry {
                    piece: piece_name(victim).to_string(),
                    square: sq.to_string(),
                    value: piece_value(victim),
                },
            ));
        }
    }

    let &(primary_sq, ref primary) = free.iter().max_by_key(|(_, entry)| entry.value)?;
    let primary = primary.clone();

    let played = parse_san(board, played_san).ok();
    let was_captured = played.is_some_and(|mv| captures_square(board, mv, primary_sq));

    let capturing_alternative = alternatives
        .iter()
        .filter_map(|alt| parse_uci(&alt.move_uci).map(|mv| (alt, mv)))
        .find(|&(_, mv)| captures_square(board, mv, primary_sq))
        .map(|(alt, _)| alt.move_uci.clone());

    Some(FreePieceFinding {
        piece: primary.piece.clone(),
        square: primary.square.clone(),
        value: primary.value,
        was_captured,
        played_move: played_san.to_string(),
        all_free_pieces: free.into_iter().map(|(_, entry)| entry).collect(),
        capturing_alternative,
    })
}

/// Does this legal move capture the piece standing on `sq`? Covers the
/// en passant case, where the captured pawn is not on the destination
/// square.
fn captures_square(board: &Board, mv: ChessMove, sq: Square) -> bool {
    if mv.get_dest() == sq {
        return is_capture(board, mv);
    }
    en_passant_victim(board, mv) == Some(sq)
}

/// Square of the pawn removed by `mv` when `mv` is an en passant capture:
/// a pawn moving diagonally onto an empty square takes the pawn beside
/// its source, on the destination file.
fn en_passant_victim(board: &Board, mv: ChessMove) -> Option<Square> {
    if board.piece_on(mv.get_source()) != Some(Piece::Pawn)
        || board.piece_on(mv.get_dest()).is_some()
        || mv.get_source().get_file() == mv.get_dest().get_file()
    {
        return None;
    }
    Some(Square::make_square(
        mv.get_source().get_rank(),
        mv.get_dest().get_file(),
    ))
}

/// Material won by the cheapest capture of the piece on `sq`, assuming a
/// single immediate recapture. Positive means the piece is effectively
/// free; `None` means no legal capture exists.
fn net_capture_gain(board: &Board, sq: Square, victim: Piece) -> Option<i32> {
    let captures: Vec<ChessMove> = MoveGen::new_legal(board)
        .filter(|&m| captures_square(board, m, sq))
        .collect();

    let cheapest = captures.into_iter().min_by_key(|m| {
        board
            .piece_on(m.get_source())
            .map(piece_value)
            .unwrap_or(i32::MAX)
    })?;
    let capturer = board.piece_on(cheapest.get_source())?;

    let after = board.make_move_new(cheapest);
    let landing = cheapest.get_dest();
    let recaptured = MoveGen::new_legal(&after).any(|m| m.get_dest() == landing);

    let cost = if recaptured { piece_value(capturer) } else { 0 };
    Some(piece_value(victim) - cost)
}
