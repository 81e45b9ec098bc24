//! Analyze a game from the command line and print the result as JSON.
//!
//! Usage: analyze-moves e4 e5 Nf3 Nc6 ...

use analysis_engine::{AnalysisConfig, GameAnalyzer, OraclePool, StockfishOracle};
use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let moves: Vec<String> = std::env::args().skip(1).collect();
    if moves.is_empty() {
        bail!("usage: analyze-moves <SAN move> [SAN move ...]");
    }

    let config = AnalysisConfig::from_env();
    let oracle = StockfishOracle::spawn(&config.engine_path, config.eval_timeout)
        .await
        .context("failed to start the engine")?;
    let analyzer = GameAnalyzer::new(OraclePool::new(vec![oracle]), config);

    let result = analyzer.analyze_game(&moves, true).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
