//! Stream Controller
//!
//! Drives one answer stream at a time through `Idle → Streaming → Settled`,
//! writing tokens into the history log and producing display markup.
//!
//! # Stream identity
//!
//! Every [`StreamController::start`] mints a new [`StreamId`]. Chunk, complete
//! and error calls carry the id they were issued against; anything that does
//! not match the live stream is dropped and reported as
//! [`EventOutcome::Discarded`]. A late token from a superseded stream therefore
//! can never land in the newer stream's entry.
//!
//! # Display
//!
//! The controller renders into a [`Presenter`]. Scrolling is queued as a
//! deferred effect and only reaches a surface after the content it belongs to
//! (see [`crate::display`]).

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::SolverConfig;
use crate::display::{DeferredEffect, DisplaySurface, Notifier, Presenter, StateChange};
use crate::error_state::{classify, ErrorDetail, ErrorState};
use crate::events::EngineInput;
use crate::history::{HistoryEntry, HistoryLog, IndexOutOfRange};
use crate::policy::{ContextDecision, ContextFlags};
use crate::render::{render_or_raw, MarkdownRenderer, RenderAdapter};

/// Delimiter placed between a carried-over answer and its continuation
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// The history slot a live stream writes to
const STREAM_SLOT: usize = 0;

/// Identifies one stream session
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(u64);

impl StreamId {
    /// Wrap a raw id (for replayed or externally stamped events)
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream_{}", self.0)
    }
}

/// Stream lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    /// No stream has started yet
    #[default]
    Idle,
    /// Tokens are arriving
    Streaming,
    /// The last stream completed or failed
    Settled,
}

/// Why an input had no effect
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DiscardReason {
    /// No stream is live
    NoActiveStream {
        /// Id the input was stamped with
        received: Option<StreamId>,
    },
    /// The input belongs to an older stream
    StaleStream {
        /// Live stream
        current: StreamId,
        /// Id the input was stamped with
        received: StreamId,
    },
    /// A stream event without an id arrived while a stream is live
    Unstamped {
        /// Live stream
        current: StreamId,
    },
    /// History selection outside the log
    IndexOutOfRange(IndexOutOfRange),
}

/// Result of applying an input
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    /// A new stream started
    Started {
        /// Its id
        stream: StreamId,
        /// How the history was prepared
        decision: ContextDecision,
    },
    /// The input was applied
    Applied,
    /// The input was ignored
    Discarded(DiscardReason),
}

impl EventOutcome {
    /// Whether the input changed anything
    #[must_use]
    pub fn is_applied(&self) -> bool {
        !matches!(self, Self::Discarded(_))
    }

    /// Id of the stream this input started
    #[must_use]
    pub fn started_stream(&self) -> Option<StreamId> {
        match self {
            Self::Started { stream, .. } => Some(*stream),
            _ => None,
        }
    }
}

/// The live stream
#[derive(Debug)]
struct StreamSession {
    id: StreamId,
    decision: ContextDecision,
    buffer: String,
    tokens_received: u32,
    started_at: Instant,
}

/// Serializable view of the whole engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot {
    /// History entries, newest first
    pub history: Vec<HistoryEntry>,
    /// Index of the displayed entry
    pub active_index: usize,
    /// Current display markup
    pub display: String,
    /// Error banner
    pub error: ErrorState,
    /// Stream lifecycle
    pub phase: StreamPhase,
    /// Waiting for the first token
    pub loading: bool,
    /// Keep-context preference
    pub keep_context: bool,
    /// Live stream, if any
    pub current_stream: Option<StreamId>,
}

/// The streaming answer engine
pub struct StreamController {
    history: HistoryLog,
    flags: ContextFlags,
    session: Option<StreamSession>,
    phase: StreamPhase,
    next_stream: u64,
    error: ErrorState,
    loading: bool,
    renderer: Arc<dyn RenderAdapter>,
    presenter: Presenter,
    notifier: Notifier,
}

impl Default for StreamController {
    fn default() -> Self {
        Self::new(Arc::new(MarkdownRenderer::new()))
    }
}

impl std::fmt::Debug for StreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamController")
            .field("history_len", &self.history.len())
            .field("active_index", &self.history.active_index())
            .field("phase", &self.phase)
            .field("stream", &self.current_stream())
            .field("renderer", &self.renderer.name())
            .finish_non_exhaustive()
    }
}

impl StreamController {
    /// Create a controller with an unbounded history
    #[must_use]
    pub fn new(renderer: Arc<dyn RenderAdapter>) -> Self {
        Self {
            history: HistoryLog::new(),
            flags: ContextFlags::default(),
            session: None,
            phase: StreamPhase::Idle,
            next_stream: 1,
            error: ErrorState::default(),
            loading: false,
            renderer,
            presenter: Presenter::new(),
            notifier: Notifier::new(),
        }
    }

    /// Create a controller from loaded configuration
    #[must_use]
    pub fn from_config(config: &SolverConfig) -> Self {
        let mut controller = Self::new(Arc::from(config.renderer.build()));
        controller.history = HistoryLog::with_max_entries(config.max_history_entries);
        controller.flags = ContextFlags::new(config.keep_context);
        controller
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The history log
    #[must_use]
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Index of the displayed entry
    #[must_use]
    pub fn active_index(&self) -> usize {
        self.history.active_index()
    }

    /// Current display markup
    #[must_use]
    pub fn display(&self) -> &str {
        self.presenter.content()
    }

    /// Error banner
    #[must_use]
    pub fn error_state(&self) -> &ErrorState {
        &self.error
    }

    /// Stream lifecycle
    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Waiting for the first token of the live stream
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Context flags
    #[must_use]
    pub fn flags(&self) -> ContextFlags {
        self.flags
    }

    /// Id of the live stream
    #[must_use]
    pub fn current_stream(&self) -> Option<StreamId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Accumulated text of the live stream
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.buffer.as_str())
    }

    /// Subscribe to state change notifications
    ///
    /// The receiver must be drained; one that falls
    /// [`SUBSCRIBER_BUFFER`](crate::display::SUBSCRIBER_BUFFER) changes behind
    /// is disconnected.
    pub fn subscribe(&mut self) -> mpsc::Receiver<StateChange> {
        self.notifier.subscribe()
    }

    /// Serializable view of the whole engine
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            history: self.history.to_vec(),
            active_index: self.history.active_index(),
            display: self.presenter.content().to_string(),
            error: self.error.clone(),
            phase: self.phase,
            loading: self.loading,
            keep_context: self.flags.keep_context,
            current_stream: self.current_stream(),
        }
    }

    // ========================================================================
    // Caller flags
    // ========================================================================

    /// Change the keep-context preference
    pub fn set_keep_context(&mut self, enabled: bool) {
        self.flags.keep_context = enabled;
        tracing::debug!(enabled, "Keep-context preference changed");
    }

    /// Regenerate the newest answer in place on the next stream
    pub fn request_overwrite(&mut self) {
        self.flags.request_overwrite();
        tracing::debug!("Overwrite requested for next stream");
    }

    /// Flip the error banner's "show details" toggle
    pub fn toggle_error_details(&mut self) -> bool {
        let expanded = self.error.toggle_details();
        self.notify(StateChange::ErrorChanged {
            visible: self.error.visible,
            kind: self.error.kind,
        });
        expanded
    }

    // ========================================================================
    // Stream lifecycle
    // ========================================================================

    /// Begin a new stream
    ///
    /// Any unsettled stream is abandoned; its id goes stale.
    pub fn start(&mut self) -> StreamId {
        let id = StreamId(self.next_stream);
        self.next_stream += 1;

        if let Some(previous) = self.session.take() {
            tracing::debug!(
                stale = %previous.id,
                tokens = previous.tokens_received,
                "Abandoning unsettled stream"
            );
        }

        let decision = self.flags.take_decision(!self.history.is_empty());
        let buffer = match decision {
            ContextDecision::Continue => {
                let carried = self.history.front().map(HistoryEntry::full).unwrap_or_default();
                let buffer = format!("{carried}{CONTEXT_SEPARATOR}");
                if let Err(e) = self.history.select(STREAM_SLOT) {
                    tracing::warn!(error = %e, "Continue decision on empty history");
                }
                self.presenter.publish(render_or_raw(self.renderer.as_ref(), &buffer));
                buffer
            }
            ContextDecision::Replace => {
                self.history.replace_front(HistoryEntry::placeholder());
                self.presenter.reset();
                String::new()
            }
            ContextDecision::Create => {
                self.history.push_front(HistoryEntry::placeholder());
                self.presenter.reset();
                String::new()
            }
        };

        self.session = Some(StreamSession {
            id,
            decision,
            buffer,
            tokens_received: 0,
            started_at: Instant::now(),
        });
        self.phase = StreamPhase::Streaming;
        self.loading = true;

        tracing::debug!(
            stream = %id,
            %decision,
            history_len = self.history.len(),
            "Stream started"
        );

        self.notify_history();
        self.notify(StateChange::ContentChanged);
        self.notify(StateChange::PhaseChanged {
            phase: self.phase,
        });
        self.notify(StateChange::LoadingChanged { loading: true });

        id
    }

    /// Append a token to the live stream
    pub fn chunk(&mut self, stream: StreamId, token: &str) -> EventOutcome {
        let session = match self.session.as_mut() {
            Some(session) if session.id == stream => session,
            Some(session) => {
                return Self::discarded(DiscardReason::StaleStream {
                    current: session.id,
                    received: stream,
                })
            }
            None => {
                return Self::discarded(DiscardReason::NoActiveStream {
                    received: Some(stream),
                })
            }
        };

        session.buffer.push_str(token);
        session.tokens_received += 1;

        if let Err(e) = self.history.set_full(STREAM_SLOT, &session.buffer) {
            tracing::warn!(stream = %stream, error = %e, "Stream entry missing");
        }
        // The display follows the live stream
        if let Err(e) = self.history.select(STREAM_SLOT) {
            tracing::warn!(stream = %stream, error = %e, "Stream entry missing");
        }
        self.presenter
            .publish(render_or_raw(self.renderer.as_ref(), &session.buffer));
        self.presenter.enqueue(DeferredEffect::ScrollToEnd);

        if self.loading {
            self.loading = false;
            self.notify(StateChange::LoadingChanged { loading: false });
        }
        self.notify_history();
        self.notify(StateChange::ContentChanged);

        EventOutcome::Applied
    }

    /// Finish the live stream
    ///
    /// For a stream that continued the previous answer, the streamed text is
    /// kept and `final_text` is ignored.
    pub fn complete(&mut self, stream: StreamId, final_text: &str) -> EventOutcome {
        let session = match self.take_session(stream) {
            Ok(session) => session,
            Err(reason) => return Self::discarded(reason),
        };

        match session.decision {
            ContextDecision::Continue => {
                if session.tokens_received > 0 && session.buffer != final_text {
                    tracing::debug!(
                        stream = %stream,
                        "Keeping streamed text for continued answer"
                    );
                }
            }
            ContextDecision::Replace | ContextDecision::Create => {
                if let Err(e) = self.history.set_full(STREAM_SLOT, final_text) {
                    tracing::warn!(stream = %stream, error = %e, "Stream entry missing");
                }
            }
        }

        let shown = self
            .history
            .select(STREAM_SLOT)
            .map(|entry| entry.full().to_string())
            .unwrap_or_default();
        self.presenter
            .publish(render_or_raw(self.renderer.as_ref(), &shown));

        self.phase = StreamPhase::Settled;
        tracing::debug!(
            stream = %stream,
            decision = %session.decision,
            tokens = session.tokens_received,
            elapsed_ms = session.started_at.elapsed().as_millis() as u64,
            "Stream completed"
        );

        if self.error.hide() {
            self.notify(StateChange::ErrorChanged {
                visible: false,
                kind: self.error.kind,
            });
        }
        self.settle_loading();
        self.notify_history();
        self.notify(StateChange::ContentChanged);
        self.notify(StateChange::PhaseChanged { phase: self.phase });

        EventOutcome::Applied
    }

    /// Record a failure
    ///
    /// `stream` is `None` for failures detected before any stream started
    /// (connectivity or key checks); those raise the banner without touching
    /// a live stream. The history log is never modified.
    pub fn error(&mut self, stream: Option<StreamId>, detail: &ErrorDetail) -> EventOutcome {
        if let Some(stream) = stream {
            match self.take_session(stream) {
                Ok(session) => {
                    self.phase = StreamPhase::Settled;
                    tracing::debug!(
                        stream = %stream,
                        tokens = session.tokens_received,
                        "Stream failed"
                    );
                    self.notify(StateChange::PhaseChanged { phase: self.phase });
                }
                Err(reason) => return Self::discarded(reason),
            }
        }

        let kind = classify(detail);
        self.error.raise(kind, detail.raw());
        tracing::warn!(kind = %kind, detail = %detail.raw(), "Answer failed");

        self.settle_loading();
        self.notify(StateChange::ErrorChanged {
            visible: self.error.visible,
            kind: self.error.kind,
        });

        EventOutcome::Applied
    }

    /// Show a past answer
    ///
    /// Out-of-range indices are ignored.
    pub fn select_history(&mut self, index: usize) -> EventOutcome {
        let full = match self.history.select(index) {
            Ok(entry) => entry.full().to_string(),
            Err(e) => return Self::discarded(DiscardReason::IndexOutOfRange(e)),
        };
        self.presenter
            .publish(render_or_raw(self.renderer.as_ref(), &full));

        self.notify_history();
        self.notify(StateChange::ContentChanged);
        EventOutcome::Applied
    }

    /// Apply any engine input
    ///
    /// Chunks and completions must carry the id of the stream they belong to.
    /// An unstamped error is accepted only while no stream is live.
    pub fn apply(&mut self, input: EngineInput) -> EventOutcome {
        match input {
            EngineInput::StreamStart => {
                let stream = self.start();
                EventOutcome::Started {
                    stream,
                    decision: self
                        .session
                        .as_ref()
                        .map_or(ContextDecision::Create, |s| s.decision),
                }
            }
            EngineInput::StreamChunk { stream, token } => match self.stamped(stream) {
                Ok(stream) => self.chunk(stream, &token),
                Err(reason) => Self::discarded(reason),
            },
            EngineInput::StreamComplete { stream, text } => match self.stamped(stream) {
                Ok(stream) => self.complete(stream, &text),
                Err(reason) => Self::discarded(reason),
            },
            EngineInput::StreamError { stream, error } => match (stream, self.current_stream()) {
                // Nothing live: an unstamped failure happened before any stream
                (None, None) => self.error(None, &error),
                (None, Some(current)) => Self::discarded(DiscardReason::Unstamped { current }),
                (Some(stream), _) => self.error(Some(stream), &error),
            },
            EngineInput::SelectHistory { index } => self.select_history(index),
            EngineInput::SetKeepContext { enabled } => {
                self.set_keep_context(enabled);
                EventOutcome::Applied
            }
            EngineInput::RequestOverwrite => {
                self.request_overwrite();
                EventOutcome::Applied
            }
            EngineInput::ToggleErrorDetails => {
                self.toggle_error_details();
                EventOutcome::Applied
            }
        }
    }

    // ========================================================================
    // Display commit
    // ========================================================================

    /// Phase 1: push pending markup to the surface
    pub fn commit_content(&mut self, surface: &mut dyn DisplaySurface) -> bool {
        self.presenter.commit_content(surface)
    }

    /// Phase 2: run deferred effects (after [`Self::commit_content`])
    pub fn run_deferred(&mut self, surface: &mut dyn DisplaySurface) -> usize {
        self.presenter.run_deferred(surface)
    }

    /// Whether deferred effects are queued
    #[must_use]
    pub fn has_deferred(&self) -> bool {
        self.presenter.has_deferred()
    }

    /// Both commit phases back to back
    pub fn present(&mut self, surface: &mut dyn DisplaySurface) -> usize {
        self.presenter.present(surface)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn take_session(&mut self, stream: StreamId) -> Result<StreamSession, DiscardReason> {
        match self.session.as_ref().map(|s| s.id) {
            Some(current) if current == stream => {
                self.session.take().ok_or(DiscardReason::NoActiveStream {
                    received: Some(stream),
                })
            }
            Some(current) => Err(DiscardReason::StaleStream {
                current,
                received: stream,
            }),
            None => Err(DiscardReason::NoActiveStream {
                received: Some(stream),
            }),
        }
    }

    fn stamped(&self, stream: Option<StreamId>) -> Result<StreamId, DiscardReason> {
        match (stream, self.current_stream()) {
            (Some(stream), _) => Ok(stream),
            (None, Some(current)) => Err(DiscardReason::Unstamped { current }),
            (None, None) => Err(DiscardReason::NoActiveStream { received: None }),
        }
    }

    fn discarded(reason: DiscardReason) -> EventOutcome {
        tracing::debug!(reason = ?reason, "Discarded engine input");
        EventOutcome::Discarded(reason)
    }

    fn settle_loading(&mut self) {
        if self.loading {
            self.loading = false;
            self.notify(StateChange::LoadingChanged { loading: false });
        }
    }

    fn notify_history(&mut self) {
        let change = StateChange::HistoryChanged {
            active_index: self.history.active_index(),
            len: self.history.len(),
        };
        self.notifier.emit(&change);
    }

    fn notify(&mut self, change: StateChange) {
        self.notifier.emit(&change);
    }
}
