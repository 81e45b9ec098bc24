//! Opening-book collaborator boundary.

/// Injectable opening-theory lookup. When no book is supplied to the
/// pipeline, the `book` move-quality label is never assigned.
pub trait OpeningBook: Send + Sync {
    fn is_book_move(&self, fen: &str, san: &str) -> bool;
}

/// Book backed by nothing; classifies no move as theory.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBook;

impl OpeningBook for NoBook {
    fn is_book_move(&self, _fen: &str, _san: &str) -> bool {
        false
    }
}
