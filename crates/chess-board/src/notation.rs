//! SAN and UCI move notation.
//!
//! Move application is a pure transition: `apply_san` never mutates the
//! input board and reports failure as a typed `Result`, so a caller can
//! skip an unparseable ply and keep going.

use std::str::FromStr;

use chess::{Board, ChessMove, File, MoveGen, Piece, Rank, Square};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotationError {
    #[error("unparseable SAN '{0}'")]
    Malformed(String),
    #[error("'{san}' is not legal in this position: {reason}")]
    Illegal { san: String, reason: String },
}

/// UCI text for a move, e.g. `e2e4` or `e7e8q`.
pub fn move_to_uci(mv: ChessMove) -> String {
    let promo = match mv.get_promotion() {
        Some(Piece::Queen) => "q",
        Some(Piece::Rook) => "r",
        Some(Piece::Bishop) => "b",
        Some(Piece::Knight) => "n",
        _ => "",
    };
    format!("{}{}{}", mv.get_source(), mv.get_dest(), promo)
}

/// Parse UCI coordinate text into a move. Legality is the caller's concern.
pub fn parse_uci(uci: &str) -> Option<ChessMove> {
    let bytes = uci.as_bytes();
    if bytes.len() < 4 {
        return None;
    }
    let square = |file: u8, rank: u8| -> Option<Square> {
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return None;
        }
        Some(Square::make_square(
            Rank::from_index((rank - b'1') as usize),
            File::from_index((file - b'a') as usize),
        ))
    };
    let from = square(bytes[0], bytes[1])?;
    let to = square(bytes[2], bytes[3])?;
    let promotion = match bytes.get(4) {
        Some(b'q') => Some(Piece::Queen),
        Some(b'r') => Some(Piece::Rook),
        Some(b'b') => Some(Piece::Bishop),
        Some(b'n') => Some(Piece::Knight),
        Some(_) => return None,
        None => None,
    };
    Some(ChessMove::new(from, to, promotion))
}

/// Does this move capture something (including en passant)?
pub fn is_capture(board: &Board, mv: ChessMove) -> bool {
    if board.piece_on(mv.get_dest()).is_some() {
        return true;
    }
    // Pawn leaving its file without landing on a piece: en passant.
    board.piece_on(mv.get_source()) == Some(Piece::Pawn)
        && mv.get_source().get_file() != mv.get_dest().get_file()
}

/// Parse a SAN move against a position.
pub fn parse_san(board: &Board, san: &str) -> Result<ChessMove, NotationError> {
    let clean: &str = san.trim_end_matches(['+', '#', '!', '?']);
    if clean.is_empty() {
        return Err(NotationError::Malformed(san.to_string()));
    }

    if clean == "O-O" || clean == "0-0" {
        return castling_move(board, san, true);
    }
    if clean == "O-O-O" || clean == "0-0-0" {
        return castling_move(board, san, false);
    }

    let (piece, rest) = match clean.as_bytes()[0] {
        b'K' => (Piece::King, &clean[1..]),
        b'Q' => (Piece::Queen, &clean[1..]),
        b'R' => (Piece::Rook, &clean[1..]),
        b'B' => (Piece::Bishop, &clean[1..]),
        b'N' => (Piece::Knight, &clean[1..]),
        c if c.is_ascii_uppercase() => return Err(NotationError::Malformed(san.to_string())),
        _ => (Piece::Pawn, clean),
    };

    let (rest, promotion) = match rest.find('=') {
        Some(at) => {
            let promo = match rest.as_bytes().get(at + 1) {
                Some(b'Q') => Piece::Queen,
                Some(b'R') => Piece::Rook,
                Some(b'B') => Piece::Bishop,
                Some(b'N') => Piece::Knight,
                _ => return Err(NotationError::Malformed(san.to_string())),
            };
            (&rest[..at], Some(promo))
        }
        None => (rest, None),
    };

    let rest = rest.replace('x', "");
    let bytes = rest.as_bytes();
    if bytes.len() < 2 {
        return Err(NotationError::Malformed(san.to_string()));
    }
    let (file, rank) = (bytes[bytes.len() - 2], bytes[bytes.len() - 1]);
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return Err(NotationError::Malformed(san.to_string()));
    }
    let dest = Square::make_square(
        Rank::from_index((rank - b'1') as usize),
        File::from_index((file - b'a') as usize),
    );
    let disambig = &rest[..rest.len() - 2];

    let mut candidates: Vec<ChessMove> = MoveGen::new_legal(board)
        .filter(|m| {
            m.get_dest() == dest
                && board.piece_on(m.get_source()) == Some(piece)
                && m.get_promotion() == promotion
        })
        .collect();

    if candidates.len() > 1 && !disambig.is_empty() {
        candidates.retain(|m| source_matches(m.get_source(), disambig));
    }

    match candidates.len() {
        1 => Ok(candidates[0]),
        0 => Err(NotationError::Illegal {
            san: san.to_string(),
            reason: "no legal move matches".to_string(),
        }),
        n => Err(NotationError::Illegal {
            san: san.to_string(),
            reason: format!("{n} candidate moves match"),
        }),
    }
}

/// Apply a SAN move, returning the move and the successor position.
pub fn apply_san(board: &Board, san: &str) -> Result<(ChessMove, Board), NotationError> {
    let mv = parse_san(board, san)?;
    Ok((mv, board.make_move_new(mv)))
}

fn source_matches(source: Square, disambig: &str) -> bool {
    disambig.bytes().all(|b| {
        if (b'a'..=b'h').contains(&b) {
            source.get_file().to_index() == (b - b'a') as usize
        } else if (b'1'..=b'8').contains(&b) {
            source.get_rank().to_index() == (b - b'1') as usize
        } else {
            true
        }
    })
}

fn castling_move(board: &Board, san: &str, kingside: bool) -> Result<ChessMove, NotationError> {
    for m in MoveGen::new_legal(board) {
        if board.piece_on(m.get_source()) != Some(Piece::King) {
            continue;
        }
        let from = m.get_source().get_file().to_index() as i32;
        let to = m.get_dest().get_file().to_index() as i32;
        if kingside && to - from == 2 {
            return Ok(m);
        }
        if !kingside && from - to == 2 {
            return Ok(m);
        }
    }
    Err(NotationError::Illegal {
        san: san.to_string(),
        reason: "castling is not available".to_string(),
    })
}

/// Parse a full FEN into a board.
pub fn board_from_fen(fen: &str) -> Result<Board, NotationError> {
    Board::from_str(fen).map_err(|e| NotationError::Illegal {
        san: fen.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::Color;

    #[test]
    fn pawn_push_and_piece_move() {
        let board = Board::default();
        let (mv, after) = apply_san(&board, "e4").unwrap();
        assert_eq!(move_to_uci(mv), "e2e4");
        assert_eq!(after.side_to_move(), Color::Black);

        let (mv, _) = apply_san(&board, "Nf3").unwrap();
        assert_eq!(move_to_uci(mv), "g1f3");
    }

    #[test]
    fn capture_and_check_suffixes_are_tolerated() {
        let mut board = Board::default();
        for san in ["e4", "d5"] {
            board = apply_san(&board, san).unwrap().1;
        }
        let (mv, _) = apply_san(&board, "exd5+?").unwrap();
        assert_eq!(move_to_uci(mv), "e4d5");
        assert!(is_capture(&board, mv));
    }

    #[test]
    fn kingside_castling() {
        let mut board = Board::default();
        for san in ["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5"] {
            board = apply_san(&board, san).unwrap().1;
        }
        let (mv, _) = apply_san(&board, "O-O").unwrap();
        assert_eq!(move_to_uci(mv), "e1g1");
    }

    #[test]
    fn disambiguation_by_file() {
        // Two knights can reach d2: b1 and f3.
        let board =
            board_from_fen("rnbqkb1r/pppppppp/5n2/8/8/5N2/PPPPPPPP/RNBQKB1R w KQkq - 2 2").unwrap();
        let (mv, _) = apply_san(&board, "Nbd2").unwrap();
        assert_eq!(move_to_uci(mv), "b1d2");
        let (mv, _) = apply_san(&board, "Nfd2").unwrap();
        assert_eq!(move_to_uci(mv), "f3d2");
    }

    #[test]
    fn promotion_parses() {
        let board = board_from_fen("8/4P1k1/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let (mv, _) = apply_san(&board, "e8=Q").unwrap();
        assert_eq!(move_to_uci(mv), "e7e8q");
    }

    #[test]
    fn garbage_is_malformed_and_illegal_is_illegal() {
        let board = Board::default();
        assert!(matches!(
            parse_san(&board, "invalidmove"),
            Err(NotationError::Malformed(_) | NotationError::Illegal { .. })
        ));
        assert!(matches!(
            parse_san(&board, "Qh5"),
            Err(NotationError::Illegal { .. })
        ));
    }

    #[test]
    fn uci_roundtrip() {
        let mv = parse_uci("e2e4").unwrap();
        assert_eq!(move_to_uci(mv), "e2e4");
        let promo = parse_uci("a7a8q").unwrap();
        assert_eq!(promo.get_promotion(), Some(Piece::Queen));
        assert!(parse_uci("xx").is_none());
        assert!(parse_uci("e9e4").is_none());
    }
}
