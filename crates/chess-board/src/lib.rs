//! Board geometry and notation utilities for the analysis engine.
//!
//! Everything in this crate is a pure function over an immutable
//! [`chess::Board`]: applying a move always produces a fresh position,
//! so concurrent analyses never alias board state.

pub use chess;

pub mod geometry;
pub mod notation;
pub mod values;

pub use notation::{
    apply_san, board_from_fen, is_capture, move_to_uci, parse_san, parse_uci, NotationError,
};
