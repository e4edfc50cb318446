//! Solver Replay - drive the engine from a recorded event log
//!
//! Reads JSON-lines engine inputs, applies them in order through the engine
//! driver and prints the final state.
//!
//! # Usage
//!
//! ```bash
//! # Replay a log file
//! solver-replay --input session.jsonl
//!
//! # From stdin, human-readable output
//! cat session.jsonl | solver-replay --format text
//!
//! # Override configuration
//! solver-replay --input session.jsonl --keep-context true --renderer plain
//!
//! # Verbose logging
//! RUST_LOG=solver_core=debug solver-replay --input session.jsonl
//! ```

mod replay;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use solver_core::{load_config_from_path, ConfigOverrides, RendererKind, StreamController};
use tokio::io::BufReader;
use tracing::info;

use replay::{format_snapshot, read_inputs, LogSurface, OutputFormat};

/// Replay a JSON-lines engine log and print the final state
#[derive(Parser, Debug)]
#[command(name = "solver-replay")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Input log (JSON lines); stdin when omitted
    #[arg(short = 'i', long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "SOLVER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Continue the newest answer instead of starting a new one
    #[arg(long, value_name = "BOOL")]
    keep_context: Option<bool>,

    /// Render adapter (markdown or plain)
    #[arg(short = 'r', long, value_name = "NAME")]
    renderer: Option<RendererKind>,

    /// Maximum history entries (0 = unbounded)
    #[arg(long, value_name = "N")]
    max_history: Option<usize>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "SOLVER_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(keep) = self.keep_context {
            overrides = overrides.with_keep_context(keep);
        }
        if let Some(max) = self.max_history {
            overrides = overrides.with_max_history_entries(max);
        }
        if let Some(renderer) = self.renderer {
            overrides = overrides.with_renderer(renderer);
        }
        overrides
    }
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("solver_replay={level},solver_core={level}"))
    });

    // stdout carries the snapshot
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config_path = args.config.clone().or_else(solver_core::default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    info!(
        source = %config.source(),
        keep_context = config.keep_context,
        max_history = config.max_history_entries,
        renderer = %config.renderer,
        "Configuration loaded"
    );

    let inputs = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open replay log: {}", path.display()))?;
            read_inputs(BufReader::new(file)).await?
        }
        None => read_inputs(BufReader::new(tokio::io::stdin())).await?,
    };
    info!(inputs = inputs.len(), "Replay log parsed");

    let controller = StreamController::from_config(&config);
    let surface = LogSurface::default();
    let (snapshot, stats) = replay::replay(controller, surface.clone(), inputs).await?;
    info!(
        inputs = stats.inputs,
        discarded = stats.discarded,
        commits = surface.commits(),
        scrolls = surface.scrolls(),
        "Replay finished"
    );

    println!("{}", format_snapshot(&snapshot, args.format)?);
    Ok(())
}
