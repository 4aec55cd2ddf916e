use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ensemble_replay::{build_engine, load_bandit, run, save_bandit, ReplayOutcome, Scenario};
use move_ensemble::EnsembleConfig;
use tracing::info;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Engine configuration (TOML); ENSEMBLE_ALPHA / ENSEMBLE_DIVERSITY_BONUS override it
    #[arg(long)]
    config: PathBuf,

    /// Scenario file (JSON)
    #[arg(long)]
    scenario: PathBuf,

    /// Bandit state file (JSON), loaded if present and rewritten after the replay
    #[arg(long)]
    bandit: Option<PathBuf>,

    /// Print one summary line per position instead of JSON traces
    #[arg(long, default_value_t = false)]
    summary: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = EnsembleConfig::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    let scenario = Scenario::load(&args.scenario)?;
    let bandit = match &args.bandit {
        Some(path) => load_bandit(path)?,
        None => None,
    };

    info!(
        agents = config.agents.len(),
        positions = scenario.positions.len(),
        restored_bandit = bandit.is_some(),
        "Replay starting"
    );

    let engine = build_engine(config, &scenario, bandit)?;
    let records = run(&engine, &scenario).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in &records {
        if args.summary {
            let line = match &record.outcome {
                ReplayOutcome::Decided { trace, .. } => trace.summary(),
                ReplayOutcome::NoProposals { reason } => format!("no move: {reason}"),
            };
            writeln!(out, "{:>4}: {}", record.index, line)?;
        } else {
            writeln!(out, "{}", serde_json::to_string(record)?)?;
        }
    }

    if let Some(path) = &args.bandit {
        save_bandit(path, &engine.bandit_snapshot().await)?;
        info!(path = %path.display(), "Bandit state saved");
    }

    let decided = records
        .iter()
        .filter(|r| matches!(r.outcome, ReplayOutcome::Decided { .. }))
        .count();
    info!(decided, skipped = records.len() - decided, "Replay finished");
    Ok(())
}
