//! Operator binary for the proposal pipeline: inspect chunking, drive a
//! document through the workflow, and query persisted runs.

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::CliConfig;
use proposal_chunker::ChunkSplitter;
use proposal_completion::OpenAiCompatClient;
use proposal_vector_index::HashEmbedder;
use proposal_workflow::{
    ApprovalPayload, CompletionProposalGenerator, LoggingBudgetSink, NullOcr, PlainTextConverter,
    RunSnapshot, RunStatus, WorkflowDeps, WorkflowRun, SNAPSHOT_FILE,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "proposal", version, about = "Draft commercial proposals from technical requirement documents")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the chunk boundaries a document splits into
    Split {
        /// Document to split
        file: PathBuf,
    },

    /// Process a document up to the approval gate
    Run {
        /// Document to process
        file: PathBuf,

        /// Directory run state is persisted under
        #[arg(long, default_value = "runs")]
        data_dir: PathBuf,

        /// Approve immediately with the suggested budget and the configured
        /// rates, and print the generated proposal
        #[arg(long)]
        approve: bool,
    },

    /// Print the persisted state of a run
    Status {
        /// Run directory (containing run.json)
        run_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Split { file } => split(&config, &file).await,
        Command::Run {
            file,
            data_dir,
            approve,
        } => run(&config, &file, &data_dir, approve).await,
        Command::Status { run_dir } => status(&run_dir).await,
    }
}

async fn split(config: &CliConfig, file: &Path) -> anyhow::Result<()> {
    let splitter = ChunkSplitter::new(config.splitter.clone());
    let chunks = splitter.split_file(file).await;

    if chunks.is_empty() {
        anyhow::bail!("no content to split in {}", file.display());
    }

    println!("{} chunks from {}", chunks.len(), file.display());
    for (i, chunk) in chunks.iter().enumerate() {
        println!("  #{i:<3} bytes {}..{} ({} bytes)", chunk.start, chunk.end, chunk.len());
    }
    Ok(())
}

async fn run(config: &CliConfig, file: &Path, data_dir: &Path, approve: bool) -> anyhow::Result<()> {
    let completion = Arc::new(OpenAiCompatClient::new(config.backend.resolve()?)?);
    let deps = WorkflowDeps {
        completion: completion.clone(),
        embedder: Arc::new(HashEmbedder::default()),
        converter: Arc::new(PlainTextConverter),
        ocr: Arc::new(NullOcr),
        proposal: Arc::new(CompletionProposalGenerator::new(completion)),
        budget_sink: Arc::new(LoggingBudgetSink),
    };

    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let run_dir = data_dir.join(stem);

    // Re-running the command on the same document resumes its run.
    let run = if run_dir.join(SNAPSHOT_FILE).exists() {
        WorkflowRun::resume(&run_dir, config.workflow_config(), deps).await?
    } else {
        WorkflowRun::create(file, &run_dir, config.workflow_config(), deps).await?
    };
    log::info!("Run {} persisted under {}", run.run_id(), run_dir.display());

    let handle = tokio::spawn(run.clone().execute());

    // Follow the run until it suspends or finishes.
    let mut rx = run.subscribe();
    let status = loop {
        let status = rx.borrow_and_update().status.clone();
        match status {
            RunStatus::WaitingForHuman | RunStatus::Completed | RunStatus::Error(_) => break status,
            _ => rx.changed().await.context("run ended unexpectedly")?,
        }
    };

    match status {
        RunStatus::WaitingForHuman => {
            let state = run.state().await;
            println!("{}", serde_json::to_string_pretty(&state)?);

            if approve {
                let payload = ApprovalPayload {
                    updated_facts: state
                        .extracted_data
                        .clone()
                        .context("run reached the gate without extracted data")?,
                    budget: state
                        .suggested_hours
                        .clone()
                        .context("run reached the gate without a suggested budget")?,
                    rates: config.rates.clone(),
                };
                run.signal_approval(payload).await?;

                let proposal = handle.await??;
                println!("{proposal}");
            } else {
                println!(
                    "Run {} is waiting for approval; re-run with --approve to finish it.",
                    run.run_id()
                );
                handle.abort();
            }
        }
        RunStatus::Completed => {
            let state = run.state().await;
            println!("{}", state.final_proposal.unwrap_or_default());
        }
        RunStatus::Error(reason) => {
            handle.abort();
            anyhow::bail!("run failed: {reason}");
        }
        _ => unreachable!("loop breaks only on gate or terminal status"),
    }

    Ok(())
}

async fn status(run_dir: &Path) -> anyhow::Result<()> {
    let snapshot = RunSnapshot::load(run_dir).await?;
    println!("run_id: {}", snapshot.run_id);
    println!("status: {}", snapshot.state.status);
    if let Some(fingerprint) = &snapshot.document_fingerprint {
        println!("source: {} (sha256 {fingerprint})", snapshot.source_path.display());
    }
    println!("{}", serde_json::to_string_pretty(&snapshot.state)?);
    Ok(())
}
