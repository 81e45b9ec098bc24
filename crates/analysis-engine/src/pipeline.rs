//! Full-game analysis pipeline: replay, evaluate, classify, enrich,
//! aggregate.
//!
//! Each distinct position is evaluated exactly once: the position before
//! ply N is the position after ply N-1, so a game of N valid plies costs
//! N+1 oracle calls (plus one MultiPV call per ply when alternatives are
//! requested).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chess::{Board, BoardStatus, Color, MoveGen};
use chess_board::{apply_san, move_to_uci};
use tracing::{info, warn};

use crate::book::OpeningBook;
use crate::categorize::{categorize_blunder, conservative};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::eval;
use crate::free_piece::detect_free_piece;
use crate::oracle::Oracle;
use crate::pool::OraclePool;
use crate::score::{to_white_cp, Score};
use crate::tactics::detect_opportunity;
use crate::types::{
    AnalysisResult, EvaluationResult, GameSummary, MoveAnalysis, MoveQuality, PlyError,
    QualityCounts, Side, SideBreakdown,
};

/// Cooperative cancellation shared between a batch run and its owner.
/// Cancellation is checked between games, never mid-game.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct GameAnalyzer<O> {
    pool: OraclePool<O>,
    config: AnalysisConfig,
    book: Option<Arc<dyn OpeningBook>>,
}

impl<O: Oracle> GameAnalyzer<O> {
    pub fn new(pool: OraclePool<O>, config: AnalysisConfig) -> Self {
        Self {
            pool,
            config,
            book: None,
        }
    }

    pub fn with_book(mut self, book: Arc<dyn OpeningBook>) -> Self {
        self.book = Some(book);
        self
    }

    /// Analyze one game given as SAN moves from the standard starting
    /// position. A partially analyzable game still succeeds; the plies
    /// that could not be analyzed are listed in the result's `errors`.
    pub async fn analyze_game(
        &self,
        moves: &[String],
        include_alternatives: bool,
    ) -> Result<AnalysisResult, AnalysisError> {
        if moves.is_empty() {
            return Err(AnalysisError::EmptyGame);
        }
        let mut oracle = self.pool.lease().await?;
        oracle.ensure_ready().await?;
        self.analyze_with(&mut oracle, moves, include_alternatives)
            .await
    }

    /// Analyze games back to back on one leased oracle per game. A failed
    /// game never aborts the batch; after cancellation the remaining games
    /// report `Cancelled` without touching the oracle.
    pub async fn analyze_batch(
        &self,
        games: &[Vec<String>],
        include_alternatives: bool,
        cancel: &CancelFlag,
    ) -> Vec<Result<AnalysisResult, AnalysisError>> {
        let mut results = Vec::with_capacity(games.len());
        for (index, game) in games.iter().enumerate() {
            if cancel.is_cancelled() {
                results.push(Err(AnalysisError::Cancelled));
                continue;
            }
            let result = self.analyze_game(game, include_alternatives).await;
            if let Err(err) = &result {
                warn!(game = index, %err, "game analysis failed");
            }
            results.push(result);
        }
        results
    }

    async fn analyze_with(
        &self,
        oracle: &mut O,
        moves: &[String],
        include_alternatives: bool,
    ) -> Result<AnalysisResult, AnalysisError> {
        let cfg = &self.config;
        info!(plies = moves.len(), "analyzing game");

        let mut errors: Vec<PlyError> = Vec::new();
        let mut plies: Vec<PlayedPly> = Vec::new();
        let mut board = Board::default();

        for (index, san) in moves.iter().enumerate() {
            let legal_replies = MoveGen::new_legal(&board).len();
            match apply_san(&board, san) {
                Ok((mv, after)) => {
                    plies.push(PlayedPly {
                        index,
                        san: san.clone(),
                        uci: move_to_uci(mv),
                        before: board,
                        after,
                        legal_replies,
                    });
                    board = after;
                }
                Err(err) if cfg.fail_fast => {
                    return Err(AnalysisError::IllegalMove {
                        ply: index + 1,
                        san: san.clone(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    warn!(ply = index + 1, san = %san, %err, "skipping unparseable move");
                    errors.push(PlyError {
                        ply: index + 1,
                        san: san.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        // Evaluation chain: entry i is the position before ply i, entry
        // i+1 the position after it.
        let mut chain: Vec<Option<EvaluationResult>> = Vec::with_capacity(plies.len() + 1);
        if let Some(first) = plies.first() {
            chain.push(self.evaluate_position(oracle, &first.before).await?);
        }
        for ply in &plies {
            chain.push(self.evaluate_position(oracle, &ply.after).await?);
        }

        let mut records: Vec<MoveAnalysis> = Vec::with_capacity(plies.len());
        let mut white = SideTally::default();
        let mut black = SideTally::default();

        for (i, ply) in plies.iter().enumerate() {
            let (eval_before, eval_after) = match (&chain[i], &chain[i + 1]) {
                (Some(before), Some(after)) => (before.clone(), after.clone()),
                _ => {
                    errors.push(PlyError {
                        ply: ply.index + 1,
                        san: ply.san.clone(),
                        reason: "engine evaluation timed out".to_string(),
                    });
                    continue;
                }
            };

            let mover_is_white = ply.before.side_to_move() == Color::White;
            let best_white =
                to_white_cp(eval_before.score, mover_is_white, cfg.mate_sentinel);
            let after_white = to_white_cp(
                eval_after.score,
                ply.after.side_to_move() == Color::White,
                cfg.mate_sentinel,
            );
            let opponent_mated = ply.after.status() == BoardStatus::Checkmate;
            let forced = ply.legal_replies == 1;
            let is_book = !forced
                && self
                    .book
                    .as_ref()
                    .is_some_and(|b| b.is_book_move(&ply.before.to_string(), &ply.san));

            let (cp_loss, quality) = if forced {
                (0, MoveQuality::Best)
            } else if is_book {
                (0, MoveQuality::Book)
            } else {
                let mate_blunder = eval::is_mate_blunder(
                    best_white,
                    after_white,
                    mover_is_white,
                    opponent_mated,
                    cfg.mate_sentinel,
                );
                let loss = eval::centipawn_loss(
                    best_white,
                    after_white,
                    mover_is_white,
                    opponent_mated,
                    cfg.max_centipawn_loss,
                    cfg.mate_sentinel,
                );
                let played_engine_move = ply.uci == eval_before.best_move;
                (
                    loss,
                    eval::classify(loss, played_engine_move, mate_blunder, &cfg.quality),
                )
            };

            let mut alternatives = Vec::new();
            if include_alternatives && !forced {
                match oracle
                    .alternatives(
                        &ply.before.to_string(),
                        cfg.search_depth,
                        cfg.max_alternative_lines,
                    )
                    .await
                {
                    Ok(mut lines) => {
                        for line in &mut lines {
                            line.principal_variation.truncate(cfg.alternative_line_plies);
                        }
                        alternatives = lines;
                    }
                    Err(AnalysisError::Timeout(_)) if !cfg.fail_fast => {
                        warn!(ply = ply.index + 1, "alternatives timed out; proceeding without");
                    }
                    Err(err) => return Err(err),
                }
            }

            let (tactic, free_piece, categorization) = if quality.needs_review() {
                let tactic = shielded("tactic detection", || {
                    detect_opportunity(
                        &ply.before,
                        &ply.san,
                        &eval_before.best_move,
                        cp_loss,
                        cfg.min_tactic_gain,
                    )
                });
                let free_piece = shielded("free piece detection", || {
                    detect_free_piece(&ply.before, &ply.san, &alternatives)
                });
                // The categorizer must always yield something for a
                // reviewable move; a panic degrades to the conservative
                // categorization, never to a missing one.
                let categorization = catch_unwind(AssertUnwindSafe(|| {
                    categorize_blunder(
                        &ply.before,
                        ply.index,
                        moves.len(),
                        cp_loss,
                        tactic.as_ref(),
                        free_piece.as_ref(),
                        &cfg.severity,
                    )
                }))
                .unwrap_or_else(|_| {
                    warn!(ply = ply.index + 1, "categorizer panicked; using fallback");
                    conservative()
                });
                (tactic, free_piece, Some(categorization))
            } else {
                (None, None, None)
            };

            let tally = if mover_is_white { &mut white } else { &mut black };
            tally.counts.record(quality, forced);
            if !forced && quality != MoveQuality::Book {
                tally.total_loss += i64::from(cp_loss);
                tally.counted += 1;
            }

            records.push(MoveAnalysis {
                ply: ply.index + 1,
                // Numbered over the plies actually played: a skipped ply
                // never advances the move counter.
                move_number: (i / 2 + 1) as u32,
                side: Side::from(ply.before.side_to_move()),
                san: ply.san.clone(),
                move_uci: ply.uci.clone(),
                position_before: ply.before.to_string(),
                position_after: ply.after.to_string(),
                evaluation_before: eval_before,
                evaluation_after: eval_after,
                centipawn_loss: cp_loss,
                quality,
                forced,
                alternatives,
                tactic,
                free_piece,
                categorization,
            });
        }

        let blunders = records.iter().filter(|r| r.quality.is_blunder()).count() as u32;
        let total_loss = white.total_loss + black.total_loss;
        let counted = white.counted + black.counted;
        let summary = GameSummary {
            analyzed_moves: records.len() as u32,
            skipped_moves: errors.len() as u32,
            blunders,
            accuracy: eval::accuracy(total_loss, counted),
            avg_centipawn_loss: if counted == 0 {
                0.0
            } else {
                total_loss as f64 / f64::from(counted)
            },
            white: white.into_breakdown(),
            black: black.into_breakdown(),
        };
        info!(
            analyzed = summary.analyzed_moves,
            skipped = summary.skipped_moves,
            blunders = summary.blunders,
            accuracy = summary.accuracy,
            "analysis complete"
        );

        Ok(AnalysisResult {
            moves: records,
            summary,
            errors,
        })
    }

    /// One oracle call per position. Terminal positions are scored locally;
    /// the engine has nothing to search there. A timeout yields `None`
    /// (the adjacent plies become unanalyzable) unless the run is
    /// fail-fast.
    async fn evaluate_position(
        &self,
        oracle: &mut O,
        board: &Board,
    ) -> Result<Option<EvaluationResult>, AnalysisError> {
        match board.status() {
            BoardStatus::Checkmate => {
                return Ok(Some(EvaluationResult {
                    best_move: String::new(),
                    score: Score::Mate(0),
                    depth: 0,
                }))
            }
            BoardStatus::Stalemate => {
                return Ok(Some(EvaluationResult {
                    best_move: String::new(),
                    score: Score::Cp(0),
                    depth: 0,
                }))
            }
            BoardStatus::Ongoing => {}
        }
        match oracle.evaluate(&board.to_string(), self.config.search_depth).await {
            Ok(evaluation) => Ok(Some(evaluation)),
            Err(AnalysisError::Timeout(elapsed)) if !self.config.fail_fast => {
                warn!(?elapsed, "position evaluation timed out");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

struct PlayedPly {
    index: usize,
    san: String,
    uci: String,
    before: Board,
    after: Board,
    /// Legal moves the mover had, for forced-move detection.
    legal_replies: usize,
}

#[derive(Default)]
struct SideTally {
    counts: QualityCounts,
    total_loss: i64,
    counted: u32,
}

impl SideTally {
    fn into_breakdown(self) -> SideBreakdown {
        SideBreakdown {
            accuracy: eval::accuracy(self.total_loss, self.counted),
            avg_centipawn_loss: if self.counted == 0 {
                0.0
            } else {
                self.total_loss as f64 / f64::from(self.counted)
            },
            counts: self.counts,
        }
    }
}

/// Enrichment is advisory; a panicking detector costs its finding, never
/// the analysis.
fn shielded<T>(what: &'static str, detect: impl FnOnce() -> Option<T>) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(detect)) {
        Ok(finding) => finding,
        Err(_) => {
            warn!(what, "detector panicked; finding dropped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::AtomicUsize;

    use crate::book::NoBook;
    use crate::types::AlternativeLine;

    /// Scripted oracle: fixed verdicts per FEN, a neutral default for
    /// everything else, optional timeouts, call counters.
    #[derive(Default)]
    struct ScriptedOracle {
        scripted: HashMap<String, EvaluationResult>,
        timeout_fens: HashSet<String>,
        eval_calls: Arc<AtomicUsize>,
        alt_calls: Arc<AtomicUsize>,
    }

    impl ScriptedOracle {
        fn script(&mut self, fen: &str, best_move: &str, score: Score) {
            self.scripted.insert(
                fen.to_string(),
                EvaluationResult {
                    best_move: best_move.to_string(),
                    score,
                    depth: 15,
                },
            );
        }

        fn default_eval(fen: &str) -> EvaluationResult {
            let board: Board = fen.parse().unwrap();
            let best = MoveGen::new_legal(&board).next().unwrap();
            EvaluationResult {
                best_move: move_to_uci(best),
                score: Score::Cp(0),
                depth: 15,
            }
        }
    }

    impl Oracle for ScriptedOracle {
        async fn ensure_ready(&mut self) -> Result<(), AnalysisError> {
            Ok(())
        }

        async fn evaluate(
            &mut self,
            fen: &str,
            _depth: u32,
        ) -> Result<EvaluationResult, AnalysisError> {
            self.eval_calls.fetch_add(1, Ordering::SeqCst);
            if self.timeout_fens.contains(fen) {
                return Err(AnalysisError::Timeout(std::time::Duration::from_secs(1)));
            }
            Ok(self
                .scripted
                .get(fen)
                .cloned()
                .unwrap_or_else(|| Self::default_eval(fen)))
        }

        async fn alternatives(
            &mut self,
            fen: &str,
            depth: u32,
            _max_lines: u32,
        ) -> Result<Vec<AlternativeLine>, AnalysisError> {
            self.alt_calls.fetch_add(1, Ordering::SeqCst);
            let eval = self.evaluate(fen, depth).await?;
            self.eval_calls.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![AlternativeLine {
                rank: 1,
                move_uci: eval.best_move.clone(),
                score: eval.score,
                depth,
                principal_variation: vec![
                    eval.best_move,
                    "a7a6".into(),
                    "a2a3".into(),
                    "b7b6".into(),
                    "b2b3".into(),
                    "c7c6".into(),
                    "c2c3".into(),
                ],
            }])
        }
    }

    fn sans(moves: &[&str]) -> Vec<String> {
        moves.iter().map(|s| s.to_string()).collect()
    }

    /// FEN of the position reached by a SAN line from the start.
    fn fen_after(moves: &[&str]) -> String {
        let mut board = Board::default();
        for san in moves {
            board = apply_san(&board, san).unwrap().1;
        }
        board.to_string()
    }

    fn analyzer(oracle: ScriptedOracle) -> GameAnalyzer<ScriptedOracle> {
        GameAnalyzer::new(OraclePool::new(vec![oracle]), AnalysisConfig::default())
    }

    #[tokio::test]
    async fn empty_game_is_rejected() {
        let analyzer = analyzer(ScriptedOracle::default());
        assert!(matches!(
            analyzer.analyze_game(&[], false).await,
            Err(AnalysisError::EmptyGame)
        ));
    }

    #[tokio::test]
    async fn every_valid_ply_gets_a_record() {
        let oracle = ScriptedOracle::default();
        let eval_calls = oracle.eval_calls.clone();
        let alt_calls = oracle.alt_calls.clone();
        let analyzer = analyzer(oracle);

        let result = analyzer
            .analyze_game(&sans(&["e4", "e5", "Qh5"]), false)
            .await
            .unwrap();

        assert_eq!(result.moves.len(), 3);
        assert_eq!(result.summary.analyzed_moves, 3);
        assert_eq!(result.summary.skipped_moves, 0);
        assert!(result.errors.is_empty());
        assert!(result.moves.iter().all(|m| m.centipawn_loss >= 0));
        assert!(result
            .moves
            .iter()
            .all(|m| m.categorization.is_some() == m.quality.needs_review()));
        assert_eq!(result.moves[0].side, Side::White);
        assert_eq!(result.moves[1].side, Side::Black);
        assert_eq!(result.moves[1].move_number, 1);
        assert_eq!(result.moves[2].move_number, 2);
        // One evaluation per distinct position, no MultiPV calls.
        assert_eq!(eval_calls.load(Ordering::SeqCst), 4);
        assert_eq!(alt_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_ply_is_skipped_and_reported() {
        let analyzer = analyzer(ScriptedOracle::default());
        let result = analyzer
            .analyze_game(&sans(&["e4", "invalidmove", "e5"]), false)
            .await
            .unwrap();

        assert_eq!(result.moves.len(), 2);
        assert_eq!(result.summary.skipped_moves, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].ply, 2);
        // The skipped ply advances neither the position nor the move
        // counter: e5 is Black's reply to move 1.
        assert_eq!(result.moves[1].san, "e5");
        assert_eq!(result.moves[1].side, Side::Black);
        assert_eq!(result.moves[1].move_number, 1);
        assert_eq!(result.moves[1].ply, 3);
    }

    #[tokio::test]
    async fn fail_fast_turns_a_bad_ply_into_an_error() {
        let oracle = ScriptedOracle::default();
        let mut config = AnalysisConfig::default();
        config.fail_fast = true;
        let analyzer = GameAnalyzer::new(OraclePool::new(vec![oracle]), config);

        let outcome = analyzer.analyze_game(&sans(&["e4", "zz"]), false).await;
        assert!(matches!(
            outcome,
            Err(AnalysisError::IllegalMove { ply: 2, .. })
        ));
    }

    #[tokio::test]
    async fn walking_into_mate_is_a_blunder_with_categorization() {
        let mut oracle = ScriptedOracle::default();
        // After 1.f3 e5 2.g4 the engine sees mate in one for Black.
        oracle.script(&fen_after(&["f3", "e5", "g4"]), "d8h4", Score::Mate(1));
        let analyzer = analyzer(oracle);

        let result = analyzer
            .analyze_game(&sans(&["f3", "e5", "g4"]), false)
            .await
            .unwrap();

        let g4 = &result.moves[2];
        assert_eq!(g4.quality, MoveQuality::Blunder);
        assert_eq!(g4.centipawn_loss, AnalysisConfig::default().max_centipawn_loss);
        assert!(g4.categorization.is_some());
        assert_eq!(result.summary.blunders, 1);
        assert!((0.0..=100.0).contains(&result.summary.accuracy));
        // Good moves carry no categorization.
        assert!(result.moves[0].categorization.is_none() || result.moves[0].quality.needs_review());
    }

    #[tokio::test]
    async fn delivered_mate_ends_the_game_cleanly() {
        let analyzer = analyzer(ScriptedOracle::default());
        let result = analyzer
            .analyze_game(&sans(&["f3", "e5", "g4", "Qh4#"]), false)
            .await
            .unwrap();

        let mate = &result.moves[3];
        assert_eq!(mate.centipawn_loss, 0);
        assert_eq!(mate.evaluation_after.score, Score::Mate(0));
        assert!(!mate.quality.is_blunder());
    }

    #[tokio::test]
    async fn only_legal_reply_is_forced_and_uncounted() {
        let analyzer = analyzer(ScriptedOracle::default());
        // After 3.Qxf7+ Black's only legal move is Kxf7.
        let result = analyzer
            .analyze_game(&sans(&["e4", "e5", "Qh5", "Nc6", "Qxf7+", "Kxf7"]), false)
            .await
            .unwrap();

        let kxf7 = &result.moves[5];
        assert!(kxf7.forced);
        assert_eq!(kxf7.quality, MoveQuality::Best);
        assert_eq!(kxf7.centipawn_loss, 0);
        assert_eq!(result.summary.black.counts.forced, 1);
    }

    #[tokio::test]
    async fn alternatives_are_fetched_and_truncated() {
        let oracle = ScriptedOracle::default();
        let alt_calls = oracle.alt_calls.clone();
        let analyzer = analyzer(oracle);

        let result = analyzer
            .analyze_game(&sans(&["e4", "e5"]), true)
            .await
            .unwrap();

        assert_eq!(alt_calls.load(Ordering::SeqCst), 2);
        for record in &result.moves {
            assert_eq!(record.alternatives.len(), 1);
            let plies = AnalysisConfig::default().alternative_line_plies;
            assert!(record.alternatives[0].principal_variation.len() <= plies);
        }
    }

    #[tokio::test]
    async fn evaluation_timeout_skips_the_adjacent_plies() {
        let mut oracle = ScriptedOracle::default();
        oracle.timeout_fens.insert(fen_after(&["e4"]));
        let analyzer = analyzer(oracle);

        let result = analyzer
            .analyze_game(&sans(&["e4", "e5", "Nf3"]), false)
            .await
            .unwrap();

        // Both plies touching the unevaluated position are unanalyzable.
        assert_eq!(result.moves.len(), 1);
        assert_eq!(result.moves[0].san, "Nf3");
        assert_eq!(result.errors.len(), 2);
        assert!(result
            .errors
            .iter()
            .all(|e| e.reason.contains("timed out")));
    }

    #[tokio::test]
    async fn book_moves_are_labelled_and_excluded_from_accuracy() {
        struct EverythingIsTheory;
        impl OpeningBook for EverythingIsTheory {
            fn is_book_move(&self, _fen: &str, _san: &str) -> bool {
                true
            }
        }

        let analyzer = analyzer(ScriptedOracle::default())
            .with_book(Arc::new(EverythingIsTheory));
        let result = analyzer
            .analyze_game(&sans(&["e4", "e5", "Nf3"]), false)
            .await
            .unwrap();

        assert!(result.moves.iter().all(|m| m.quality == MoveQuality::Book));
        assert_eq!(result.summary.accuracy, 100.0);
        assert_eq!(result.summary.white.counts.book, 2);
        assert_eq!(result.summary.black.counts.book, 1);
    }

    #[tokio::test]
    async fn empty_book_labels_nothing() {
        let analyzer = analyzer(ScriptedOracle::default()).with_book(Arc::new(NoBook));
        let result = analyzer
            .analyze_game(&sans(&["e4", "e5"]), false)
            .await
            .unwrap();
        assert!(result.moves.iter().all(|m| m.quality != MoveQuality::Book));
    }

    #[tokio::test]
    async fn analysis_is_deterministic() {
        let moves = sans(&["e4", "e5", "Nf3", "Nc6"]);
        let analyzer = analyzer(ScriptedOracle::default());
        let first = analyzer.analyze_game(&moves, false).await.unwrap();
        let second = analyzer.analyze_game(&moves, false).await.unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn cancelled_batch_reports_remaining_games() {
        let analyzer = analyzer(ScriptedOracle::default());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let games = vec![sans(&["e4"]), sans(&["d4"])];
        let results = analyzer.analyze_batch(&games, false, &cancel).await;
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(AnalysisError::Cancelled))));
    }

    #[tokio::test]
    async fn batch_runs_games_independently() {
        let analyzer = analyzer(ScriptedOracle::default());
        let cancel = CancelFlag::new();
        let games = vec![sans(&["e4", "e5"]), vec![], sans(&["d4"])];
        let results = analyzer.analyze_batch(&games, false, &cancel).await;
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(AnalysisError::EmptyGame)));
        assert!(results[2].is_ok());
    }
}
