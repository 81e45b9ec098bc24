//! Material values on the standard 1/3/3/5/9 scale.

use chess::{Board, Color, Piece};

pub const PAWN_VALUE: i32 = 1;
pub const KNIGHT_VALUE: i32 = 3;
pub const BISHOP_VALUE: i32 = 3;
pub const ROOK_VALUE: i32 = 5;
pub const QUEEN_VALUE: i32 = 9;

/// Sentinel used when ordering fork/skewer targets: the king outranks
/// everything but never contributes to material sums.
pub const KING_ORDERING_VALUE: i32 = 99;

/// Material value of a piece; the king counts as zero.
pub fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => PAWN_VALUE,
        Piece::Knight => KNIGHT_VALUE,
        Piece::Bishop => BISHOP_VALUE,
        Piece::Rook => ROOK_VALUE,
        Piece::Queen => QUEEN_VALUE,
        Piece::King => 0,
    }
}

/// Value used when comparing attack targets, where the king must rank
/// above every other piece.
pub fn target_value(piece: Piece) -> i32 {
    match piece {
        Piece::King => KING_ORDERING_VALUE,
        other => piece_value(other),
    }
}

/// Sliding piece (moves along rays)?
pub fn is_slider(piece: Piece) -> bool {
    matches!(piece, Piece::Bishop | Piece::Rook | Piece::Queen)
}

/// Lowercase English name, for human-readable findings.
pub fn piece_name(piece: Piece) -> &'static str {
    match piece {
        Piece::Pawn => "pawn",
        Piece::Knight => "knight",
        Piece::Bishop => "bishop",
        Piece::Rook => "rook",
        Piece::Queen => "queen",
        Piece::King => "king",
    }
}

/// Total material for one side (king excluded).
pub fn material_count(board: &Board, color: Color) -> i32 {
    let own = *board.color_combined(color);
    [
        (Piece::Pawn, PAWN_VALUE),
        (Piece::Knight, KNIGHT_VALUE),
        (Piece::Bishop, BISHOP_VALUE),
        (Piece::Rook, ROOK_VALUE),
        (Piece::Queen, QUEEN_VALUE),
    ]
    .iter()
    .map(|&(piece, value)| (*board.pieces(piece) & own).popcnt() as i32 * value)
    .sum()
}

/// Material balance from `side`'s point of view.
pub fn material_diff(board: &Board, side: Color) -> i32 {
    material_count(board, side) - material_count(board, !side)
}

/// Number of pieces (both colors, kings included) still on the board.
pub fn piece_count(board: &Board) -> u32 {
    board.combined().popcnt()
}

/// Number of pawns of both colors still on the board.
pub fn pawn_count(board: &Board) -> u32 {
    board.pieces(Piece::Pawn).popcnt()
}
