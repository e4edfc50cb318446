//! Replay of recorded engine inputs
//!
//! A replay log is JSON lines, one [`EngineInput`] per line. Blank lines and
//! lines starting with `#` are skipped.
//!
//! Stream events must carry the id of the stream they belong to. Ids are
//! minted by `stream_start` in order, starting at 1.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use solver_core::{
    DisplaySurface, EngineDriver, EngineHandle, EngineInput, EngineSnapshot, EventOutcome,
    StreamController,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Output format for the final state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed engine snapshot
    #[default]
    Json,
    /// Human-readable summary
    Text,
}

/// Counts display commits and logs them
#[derive(Clone, Debug, Default)]
pub struct LogSurface {
    commits: Arc<AtomicUsize>,
    scrolls: Arc<AtomicUsize>,
}

impl LogSurface {
    /// Content commits so far
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::Relaxed)
    }

    /// Scroll requests so far
    pub fn scrolls(&self) -> usize {
        self.scrolls.load(Ordering::Relaxed)
    }
}

impl DisplaySurface for LogSurface {
    fn set_content(&mut self, markup: &str) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(bytes = markup.len(), "Display content committed");
    }

    fn scroll_to_end(&mut self) {
        self.scrolls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("Display scrolled to end");
    }
}

/// Totals for one replay
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Inputs read from the log
    pub inputs: usize,
    /// Inputs the engine ignored
    pub discarded: usize,
}

/// Parse every input from a JSON-lines reader
///
/// # Errors
///
/// Fails on read errors or the first line that is not a valid input.
pub async fn read_inputs<R>(reader: R) -> Result<Vec<EngineInput>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut inputs = Vec::new();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read replay log")? {
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let input: EngineInput = serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid engine input on line {line_no}"))?;
        inputs.push(input);
    }

    Ok(inputs)
}

/// Feed inputs through a running engine in order
///
/// # Errors
///
/// Fails if the engine stops before every input is applied.
pub async fn apply_all(handle: &EngineHandle, inputs: Vec<EngineInput>) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();
    for input in inputs {
        let name = input.name();
        let outcome = handle.send(input).await.context("Engine stopped")?;
        stats.inputs += 1;
        match outcome {
            EventOutcome::Discarded(reason) => {
                stats.discarded += 1;
                tracing::info!(input = name, reason = ?reason, "Input discarded");
            }
            EventOutcome::Started { stream, decision } => {
                tracing::info!(%stream, %decision, "Stream started");
            }
            EventOutcome::Applied => {}
        }
    }
    Ok(stats)
}

/// Run a whole replay and return the final snapshot
///
/// # Errors
///
/// Fails if the engine stops early.
pub async fn replay(
    controller: StreamController,
    surface: LogSurface,
    inputs: Vec<EngineInput>,
) -> Result<(EngineSnapshot, ReplayStats)> {
    let (handle, task) = EngineDriver::spawn(controller, Box::new(surface));
    let stats = apply_all(&handle, inputs).await?;
    let snapshot = handle.snapshot().await.context("Engine stopped")?;
    handle.shutdown().await.context("Engine stopped")?;
    task.await.context("Engine task panicked")?;
    Ok((snapshot, stats))
}

/// Render the final state
///
/// # Errors
///
/// Fails only if JSON serialization fails.
pub fn format_snapshot(snapshot: &EngineSnapshot, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")
        }
        OutputFormat::Text => Ok(format_text(snapshot)),
    }
}

fn format_text(snapshot: &EngineSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "phase: {:?}  keep_context: {}  entries: {}",
        snapshot.phase,
        snapshot.keep_context,
        snapshot.history.len()
    );
    for (i, entry) in snapshot.history.iter().enumerate() {
        let marker = if i == snapshot.active_index { '>' } else { ' ' };
        let _ = writeln!(
            out,
            "{marker} [{i}] {} {}",
            entry.time_label(),
            entry.summary()
        );
    }
    if snapshot.error.visible {
        let _ = writeln!(
            out,
            "{} {}: {}",
            snapshot.error.icon, snapshot.error.title, snapshot.error.description
        );
        if !snapshot.error.raw_detail.is_empty() {
            let _ = writeln!(out, "   details: {}", snapshot.error.raw_detail);
        }
    }
    out.push_str("---\n");
    out.push_str(&snapshot.display);
    if !snapshot.display.ends_with('\n') {
        out.push('\n');
    }
    out
}
