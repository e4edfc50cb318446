//! Solver Core - Headless Streaming Answer Engine
//!
//! Aggregates a backend's streamed answer tokens into a history of answers,
//! decides whether a new answer continues, replaces or follows the previous
//! one, and turns the active answer into display markup. No UI framework is
//! involved; a surface only has to implement [`DisplaySurface`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │          Backend stream            Caller actions            │
//! │   (start / chunk / complete /   (select, keep-context,       │
//! │            error)                overwrite, details)         │
//! │              │                          │                    │
//! │              └───────── EngineInput ────┘                    │
//! │                            │                                 │
//! │                     ┌──────┴───────┐                         │
//! │                     │ EngineDriver │  (single owner task)    │
//! │                     └──────┬───────┘                         │
//! │  ┌─────────────────────────┴──────────────────────────────┐  │
//! │  │                  StreamController                      │  │
//! │  │  ┌────────────┐ ┌─────────────┐ ┌────────┐ ┌────────┐  │  │
//! │  │  │ HistoryLog │ │ContextFlags │ │ Render │ │ Error  │  │  │
//! │  │  │            │ │  (policy)   │ │Adapter │ │ State  │  │  │
//! │  │  └────────────┘ └─────────────┘ └────────┘ └────────┘  │  │
//! │  └─────────────────────────┬──────────────────────────────┘  │
//! │                            │                                 │
//! │          StateChange ◄─────┴─────► Presenter                 │
//! │          (subscribers)      (content, then deferred scroll)  │
//! │                                     │                        │
//! │                              DisplaySurface                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`StreamController`]: the synchronous state machine
//! - [`EngineDriver`] / [`EngineHandle`]: async single-owner wrapper
//! - [`HistoryLog`]: newest-first answer log with an active index
//! - [`ContextDecision`]: continue, replace or create
//! - [`RenderAdapter`]: text to markup, with raw-text fallback
//! - [`ErrorState`]: classified user-facing error banner
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use solver_core::{MarkdownRenderer, StreamController};
//!
//! let mut engine = StreamController::new(Arc::new(MarkdownRenderer::new()));
//! let stream = engine.start();
//! engine.chunk(stream, "**Hello**");
//! engine.complete(stream, "**Hello**");
//!
//! assert_eq!(engine.history().len(), 1);
//! assert!(engine.display().contains("<strong>Hello</strong>"));
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod controller;
pub mod display;
pub mod driver;
pub mod error_state;
pub mod events;
pub mod history;
pub mod policy;
pub mod render;

pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, SolverConfig,
};
pub use controller::{
    DiscardReason, EngineSnapshot, EventOutcome, StreamController, StreamId, StreamPhase,
    CONTEXT_SEPARATOR,
};
pub use display::{DisplaySurface, RecordingSurface, StateChange};
pub use driver::{DriverError, EngineDriver, EngineHandle};
pub use error_state::{classify, ErrorDetail, ErrorKind, ErrorState};
pub use events::{EngineInput, StreamingToken};
pub use history::{HistoryEntry, HistoryLog, IndexOutOfRange};
pub use policy::{decide, ContextDecision, ContextFlags};
pub use render::{MarkdownRenderer, PlainRenderer, RenderAdapter, RenderError, RendererKind};
