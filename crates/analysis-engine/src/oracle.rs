//! Evaluation oracle: a UCI engine process behind a narrow async interface.
//!
//! The protocol is stateful per conversation — one request, one blocking
//! answer — so an oracle instance must never be shared without exclusive
//! access (see `pool`).

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::score::Score;
use crate::types::{AlternativeLine, EvaluationResult};

/// Narrow interface the pipeline drives. Implemented by the real engine
/// wrapper and by scripted oracles in tests.
#[allow(async_fn_in_trait)]
pub trait Oracle {
    /// Readiness is a precondition checked before the first call of a
    /// run, not polled mid-run.
    async fn ensure_ready(&mut self) -> Result<(), AnalysisError>;

    /// Best move and score for a position, from the side to move's
    /// perspective.
    async fn evaluate(&mut self, fen: &str, depth: u32) -> Result<EvaluationResult, AnalysisError>;

    /// Up to `max_lines` ranked candidate lines, in engine order.
    async fn alternatives(
        &mut self,
        fen: &str,
        depth: u32,
        max_lines: u32,
    ) -> Result<Vec<AlternativeLine>, AnalysisError>;
}

/// A Stockfish (or any UCI engine) child process.
pub struct StockfishOracle {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    call_timeout: Duration,
}

impl StockfishOracle {
    /// Spawn the engine and complete the UCI handshake.
    pub async fn spawn(path: &str, call_timeout: Duration) -> Result<Self, AnalysisError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| AnalysisError::Engine(format!("failed to spawn '{path}': {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| AnalysisError::Engine("engine stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| AnalysisError::Engine("engine stdout unavailable".into()))?;

        let mut oracle = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
            call_timeout,
        };

        oracle.send("uci").await?;
        oracle.wait_for("uciok").await?;
        oracle.send("setoption name Threads value 1").await?;
        oracle.send("setoption name Hash value 256").await?;
        oracle.send("setoption name UCI_AnalyseMode value true").await?;
        oracle.ensure_ready().await?;

        Ok(oracle)
    }

    /// Ask the engine to quit and wait for the process to exit.
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }

    async fn send(&mut self, cmd: &str) -> Result<(), AnalysisError> {
        debug!(cmd, "engine <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| AnalysisError::Engine(format!("write failed: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| AnalysisError::Engine(format!("flush failed: {e}")))
    }

    async fn read_line(&mut self) -> Result<String, AnalysisError> {
        let mut line = String::new();
        let n = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| AnalysisError::Engine(format!("read failed: {e}")))?;
        if n == 0 {
            return Err(AnalysisError::Engine("engine closed its pipe".into()));
        }
        let trimmed = line.trim().to_string();
        debug!(line = %trimmed, "engine >");
        Ok(trimmed)
    }

    async fn wait_for(&mut self, expected: &str) -> Result<(), AnalysisError> {
        let timeout = self.call_timeout;
        let wait = async {
            loop {
                if self.read_line().await? == expected {
                    return Ok(());
                }
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::Timeout(timeout)),
        }
    }

    /// Collect info lines until `bestmove`, keeping the last reported
    /// score per multipv slot.
    async fn collect_search(&mut self, slots: usize) -> Result<Vec<InfoLine>, AnalysisError> {
        let mut lines: Vec<InfoLine> = vec![InfoLine::default(); slots];
        loop {
            let line = self.read_line().await?;
            if line.starts_with("bestmove") {
                if let Some(best) = line.split_whitespace().nth(1) {
                    if let Some(first) = lines.first_mut() {
                        first.bestmove = Some(best.to_string());
                    }
                }
                return Ok(lines);
            }
            if !line.starts_with("info") || !line.contains(" pv ") {
                continue;
            }
            let slot = token_after(&line, "multipv")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(1)
                .saturating_sub(1);
            if let Some(entry) = lines.get_mut(slot) {
                if let Some(mate) = token_after(&line, "mate").and_then(|v| v.parse().ok()) {
                    entry.score = Some(Score::Mate(mate));
                } else if let Some(cp) = token_after(&line, "cp").and_then(|v| v.parse().ok()) {
                    entry.score = Some(Score::Cp(cp));
                }
                if let Some(depth) = token_after(&line, "depth").and_then(|v| v.parse().ok()) {
                    entry.depth = depth;
                }
                entry.pv = pv_moves(&line);
            }
        }
    }

    /// On timeout the engine is mid-search; stop it and drain up to
    /// `bestmove` so the conversation can continue.
    async fn resync(&mut self) {
        if self.send("stop").await.is_err() {
            return;
        }
        let drain = async {
            loop {
                match self.read_line().await {
                    Ok(line) if line.starts_with("bestmove") => break,
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
        };
        if tokio::time::timeout(Duration::from_secs(2), drain).await.is_err() {
            warn!("engine did not answer 'stop'; subsequent calls may fail");
        }
    }
}

impl Oracle for StockfishOracle {
    async fn ensure_ready(&mut self) -> Result<(), AnalysisError> {
        self.send("isready").await?;
        self.wait_for("readyok").await.map_err(|e| match e {
            AnalysisError::Timeout(_) => AnalysisError::NotReady,
            other => other,
        })
    }

    async fn evaluate(&mut self, fen: &str, depth: u32) -> Result<EvaluationResult, AnalysisError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let timeout = self.call_timeout;
        let outcome = tokio::time::timeout(timeout, self.collect_search(1)).await;
        let lines = match outcome {
            Ok(result) => result?,
            Err(_) => {
                self.resync().await;
                return Err(AnalysisError::Timeout(timeout));
            }
        };

        let line = &lines[0];
        let best_move = line
            .bestmove
            .clone()
            .or_else(|| line.pv.first().cloned())
            .ok_or_else(|| AnalysisError::Engine("no bestmove in engine output".into()))?;
        let score = line
            .score
            .ok_or_else(|| AnalysisError::Engine("no score in engine output".into()))?;

        Ok(EvaluationResult {
            best_move,
            score,
            depth: if line.depth > 0 { line.depth } else { depth },
        })
    }

    async fn alternatives(
        &mut self,
        fen: &str,
        depth: u32,
        max_lines: u32,
    ) -> Result<Vec<AlternativeLine>, AnalysisError> {
        self.send(&format!("setoption name MultiPV value {max_lines}"))
            .await?;
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let timeout = self.call_timeout;
        let outcome = tokio::time::timeout(timeout, self.collect_search(max_lines as usize)).await;
        let collected = match outcome {
            Ok(result) => result,
            Err(_) => {
                self.resync().await;
                let _ = self.send("setoption name MultiPV value 1").await;
                return Err(AnalysisError::Timeout(timeout));
            }
        };
        self.send("setoption name MultiPV value 1").await?;
        let lines = collected?;

        // Positions with few legal moves fill fewer slots than requested.
        Ok(lines
            .into_iter()
            .enumerate()
            .filter(|(_, line)| !line.pv.is_empty() && line.score.is_some())
            .map(|(i, line)| AlternativeLine {
                rank: i as u32 + 1,
                move_uci: line.pv[0].clone(),
                score: line.score.unwrap_or(Score::Cp(0)),
                depth: if line.depth > 0 { line.depth } else { depth },
                principal_variation: line.pv,
            })
            .collect())
    }
}

impl Drop for StockfishOracle {
    fn drop(&mut self) {
        let _ = self.process.start_kill();
    }
}

#[derive(Clone, Debug, Default)]
struct InfoLine {
    score: Option<Score>,
    depth: u32,
    pv: Vec<String>,
    bestmove: Option<String>,
}

/// Value following a keyword token in a UCI info line.
fn token_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let mut tokens = line.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == key {
            return tokens.next();
        }
    }
    None
}

/// Moves of the principal variation, which runs to the end of the line.
fn pv_moves(line: &str) -> Vec<String> {
    line.split_whitespace()
        .skip_while(|&t| t != "pv")
        .skip(1)
        .take_while(|&t| t != "string")
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_extraction() {
        let line = "info depth 20 seldepth 25 multipv 2 score cp 35 nodes 100000 pv e2e4 e7e5";
        assert_eq!(token_after(line, "cp"), Some("35"));
        assert_eq!(token_after(line, "multipv"), Some("2"));
        assert_eq!(token_after(line, "depth"), Some("20"));
        assert_eq!(token_after(line, "mate"), None);
    }

    #[test]
    fn mate_token() {
        let line = "info depth 18 score mate -3 pv h7h8";
        assert_eq!(token_after(line, "mate"), Some("-3"));
    }

    #[test]
    fn pv_extraction() {
        let line = "info depth 20 score cp 35 pv e2e4 e7e5 g1f3";
        assert_eq!(pv_moves(line), vec!["e2e4", "e7e5", "g1f3"]);
        assert!(pv_moves("info depth 20 score cp 35").is_empty());
    }
}
