//! Attack and ray queries over a single position.

use chess::{BitBoard, Board, Color, Piece, Square, EMPTY};

use crate::values::{is_slider, piece_value};

fn full_board() -> BitBoard {
    BitBoard::new(u64::MAX)
}

/// Squares attacked by the piece standing on `sq` (occupancy-aware).
/// Empty if the square is vacant.
pub fn attacks_from(board: &Board, sq: Square) -> BitBoard {
    let occupied = *board.combined();
    match board.piece_on(sq) {
        None => EMPTY,
        Some(Piece::Pawn) => {
            // color_on is Some whenever piece_on is
            let color = board.color_on(sq).unwrap_or(Color::White);
            chess::get_pawn_attacks(sq, color, full_board())
        }
        Some(Piece::Knight) => chess::get_knight_moves(sq),
        Some(Piece::King) => chess::get_king_moves(sq),
        Some(Piece::Bishop) => chess::get_bishop_moves(sq, occupied),
        Some(Piece::Rook) => chess::get_rook_moves(sq, occupied),
        Some(Piece::Queen) => {
            chess::get_bishop_moves(sq, occupied) | chess::get_rook_moves(sq, occupied)
        }
    }
}

/// All pieces of `color` that attack `sq`.
pub fn attackers_of(board: &Board, color: Color, sq: Square) -> BitBoard {
    let occupied = *board.combined();
    let own = *board.color_combined(color);

    // Pawn attackers via reverse lookup: the squares a pawn of the
    // opposite color would attack from `sq` are exactly the squares
    // from which a pawn of `color` attacks `sq`.
    let pawns = chess::get_pawn_attacks(sq, !color, *board.pieces(Piece::Pawn) & own);
    let knights = chess::get_knight_moves(sq) & *board.pieces(Piece::Knight) & own;
    let kings = chess::get_king_moves(sq) & *board.pieces(Piece::King) & own;
    let diag = chess::get_bishop_moves(sq, occupied)
        & (*board.pieces(Piece::Bishop) | *board.pieces(Piece::Queen))
        & own;
    let ortho = chess::get_rook_moves(sq, occupied)
        & (*board.pieces(Piece::Rook) | *board.pieces(Piece::Queen))
        & own;

    pawns | knights | kings | diag | ortho
}

/// Cheapest piece of `color` attacking `sq`, if any.
pub fn least_valuable_attacker(board: &Board, color: Color, sq: Square) -> Option<(Square, Piece)> {
    attackers_of(board, color, sq)
        .into_iter()
        .filter_map(|from| board.piece_on(from).map(|piece| (from, piece)))
        .min_by_key(|&(_, piece)| crate::values::target_value(piece))
}

/// First occupied square strictly behind `front` on the ray running from
/// `from` through `front`. None when the squares do not share a ray or the
/// ray is empty past `front`.
pub fn piece_behind(board: &Board, from: Square, front: Square) -> Option<(Square, Piece, Color)> {
    let ray = chess::line(from, front);
    if ray == EMPTY {
        return None;
    }
    let occupied = *board.combined();
    for sq in ray & occupied {
        if sq == from || sq == front {
            continue;
        }
        // Behind means `front` sits between `from` and the candidate,
        // with nothing else in the gap.
        if (chess::between(from, sq) & BitBoard::from_square(front)) == EMPTY {
            continue;
        }
        if (chess::between(front, sq) & occupied) != EMPTY {
            continue;
        }
        if let (Some(piece), Some(color)) = (board.piece_on(sq), board.color_on(sq)) {
            return Some((sq, piece, color));
        }
    }
    None
}

/// Can `piece` slide along the ray between two squares?
pub fn slides_on_ray(piece: Piece, a: Square, b: Square) -> bool {
    if !is_slider(piece) || chess::line(a, b) == EMPTY {
        return false;
    }
    let df = (a.get_file().to_index() as i32 - b.get_file().to_index() as i32).abs();
    let dr = (a.get_rank().to_index() as i32 - b.get_rank().to_index() as i32).abs();
    let diagonal = df == dr;
    match piece {
        Piece::Bishop => diagonal,
        Piece::Rook => !diagonal,
        Piece::Queen => true,
        _ => false,
    }
}

/// Enemy pieces (from `pov`'s point of view) attacked by the piece on `from`.
pub fn attacked_enemy_pieces(board: &Board, from: Square, pov: Color) -> Vec<(Piece, Square)> {
    let mut result = Vec::new();
    for sq in attacks_from(board, from) {
        if let (Some(piece), Some(color)) = (board.piece_on(sq), board.color_on(sq)) {
            if color != pov {
                result.push((piece, sq));
            }
        }
    }
    result
}

/// Is the piece on `sq` defended by `color`? Counts direct defenders plus
/// x-ray defense through an enemy slider standing on the same ray.
pub fn is_defended(board: &Board, color: Color, sq: Square) -> bool {
    if attackers_of(board, color, sq) != EMPTY {
        return true;
    }

    // X-ray: an enemy slider attacks sq, and directly behind it sits one
    // of our sliders able to move along the same ray.
    for attacker_sq in attackers_of(board, !color, sq) {
        if !board.piece_on(attacker_sq).is_some_and(is_slider) {
            continue;
        }
        if let Some((behind_sq, behind_piece, behind_color)) = piece_behind(board, sq, attacker_sq)
        {
            if behind_color == color && slides_on_ray(behind_piece, behind_sq, sq) {
                return true;
            }
        }
    }
    false
}

/// Undefended piece.
pub fn is_hanging(board: &Board, color: Color, sq: Square) -> bool {
    !is_defended(board, color, sq)
}

/// Attacked by an enemy piece cheaper than itself (king excluded).
pub fn can_be_taken_by_lower_piece(board: &Board, sq: Square) -> bool {
    let (piece, color) = match (board.piece_on(sq), board.color_on(sq)) {
        (Some(p), Some(c)) => (p, c),
        _ => return false,
    };
    attackers_of(board, !color, sq).into_iter().any(|from| {
        board
            .piece_on(from)
            .is_some_and(|att| att != Piece::King && piece_value(att) < piece_value(piece))
    })
}

/// A piece stands badly when it is attacked and either hanging or takeable
/// by a cheaper piece.
pub fn is_in_bad_spot(board: &Board, sq: Square) -> bool {
    let color = match board.color_on(sq) {
        Some(c) => c,
        None => return false,
    };
    if attackers_of(board, !color, sq) == EMPTY {
        return false;
    }
    is_hanging(board, color, sq) || can_be_taken_by_lower_piece(board, sq)
}
