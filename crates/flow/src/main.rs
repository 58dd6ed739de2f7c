// Flowser replay
//
// Rehydrates a frozen flow, runs one decision pass against a recorded
// decision task and prints the decisions that would be submitted.
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Stdout carries only JSON output, logs go to stderr.
// Design Decision: Submit through InMemoryDecisionResponder, the same complete path a worker takes.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use flowser_flow::replicate::unfreeze_with_config;
use flowser_flow::{DecisionTask, FlowConfig, FlowSnapshot, InMemoryDecisionResponder};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowser-replay")]
#[command(about = "Replay a decision task against a frozen flow")]
#[command(version)]
struct Cli {
    /// Flow snapshot (JSON)
    #[arg(long, short)]
    snapshot: PathBuf,

    /// Decision task with its history (JSON)
    #[arg(long, short)]
    task: PathBuf,

    /// Where to write the updated snapshot (embedded in stdout output if omitted)
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flowser_flow=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = FlowConfig::from_env();

    tracing::info!(
        snapshot = %cli.snapshot.display(),
        task = %cli.task.display(),
        "flowser-replay starting"
    );

    let raw = tokio::fs::read_to_string(&cli.snapshot)
        .await
        .with_context(|| format!("Failed to read snapshot {}", cli.snapshot.display()))?;
    let snapshot = FlowSnapshot::from_json(&raw).context("Failed to parse snapshot")?;
    let mut flow = unfreeze_with_config(snapshot, config).context("Failed to unfreeze flow")?;

    let raw = tokio::fs::read_to_string(&cli.task)
        .await
        .with_context(|| format!("Failed to read decision task {}", cli.task.display()))?;
    let mut task: DecisionTask =
        serde_json::from_str(&raw).context("Failed to parse decision task")?;

    flow.decide(&mut task);

    let frozen = flow.freeze().context("Failed to freeze flow")?;
    let responder = InMemoryDecisionResponder::new();
    let frozen = serde_json::to_value(&frozen).context("Failed to encode snapshot")?;
    task.complete(&responder, Some(frozen.clone()))
        .await
        .context("Failed to complete decision task")?;

    let decisions: Vec<_> = responder
        .completed()
        .into_iter()
        .flat_map(|response| response.decisions)
        .collect();

    let output = match cli.output {
        Some(path) => {
            tokio::fs::write(&path, serde_json::to_string_pretty(&frozen)?)
                .await
                .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
            tracing::info!(path = %path.display(), "snapshot written");
            serde_json::to_value(&decisions)?
        }
        None => json!({ "decisions": decisions, "snapshot": frozen }),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
