//! Display Commit
//!
//! The engine never touches a UI directly. Every mutation is announced as a
//! [`StateChange`] to subscribers, and display output goes through a
//! [`Presenter`] in two phases:
//!
//! 1. [`Presenter::commit_content`] pushes the latest markup to the surface.
//! 2. [`Presenter::run_deferred`] runs queued effects (scroll-to-end) once the
//!    content commit has happened.
//!
//! A deferred effect is never run while content is still uncommitted, so a
//! scroll always measures the content it was queued for.

use std::collections::VecDeque;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error_state::ErrorKind;

/// What the display layer needs from a UI
pub trait DisplaySurface {
    /// Replace the displayed markup
    fn set_content(&mut self, markup: &str);

    /// Scroll the content view to its end
    fn scroll_to_end(&mut self);
}

/// Notification emitted after each engine mutation
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateChange {
    /// History entries or the active index changed
    HistoryChanged {
        /// Active index after the change
        active_index: usize,
        /// Log length after the change
        len: usize,
    },
    /// Display markup changed
    ContentChanged,
    /// Error banner shown or hidden
    ErrorChanged {
        /// Whether the banner is now visible
        visible: bool,
        /// Classification, when visible
        kind: Option<ErrorKind>,
    },
    /// Stream lifecycle moved
    PhaseChanged {
        /// The new phase
        phase: crate::controller::StreamPhase,
    },
    /// Loading indicator flipped
    LoadingChanged {
        /// Whether the engine is waiting for the first token
        loading: bool,
    },
}

/// Effects that must wait for the content commit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferredEffect {
    /// Scroll the content view to its end
    ScrollToEnd,
}

/// Changes buffered per subscriber before it counts as lagging
pub const SUBSCRIBER_BUFFER: usize = 1024;

/// Fan-out of [`StateChange`] notifications
///
/// Each subscriber gets a bounded channel and must keep draining it. A
/// subscriber whose buffer is full when a change is emitted is dropped, and
/// its receiver then yields `None` once the buffered changes are read.
/// Emitting never blocks the engine.
#[derive(Debug)]
pub struct Notifier {
    subscribers: Vec<mpsc::Sender<StateChange>>,
    capacity: usize,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::with_capacity(SUBSCRIBER_BUFFER)
    }
}

impl Notifier {
    /// Create a notifier with no subscribers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a notifier whose subscribers buffer `capacity` changes
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Register a new subscriber
    pub fn subscribe(&mut self) -> mpsc::Receiver<StateChange> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.push(tx);
        rx
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Send a change to every subscriber, dropping closed and lagging ones
    pub fn emit(&mut self, change: &StateChange) {
        let capacity = self.capacity;
        self.subscribers
            .retain(|tx| match tx.try_send(change.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(capacity, "Dropping state subscriber that stopped reading");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!("Removed closed state subscriber");
                    false
                }
            });
    }
}

/// Holds display markup between the engine and a [`DisplaySurface`]
#[derive(Debug, Default)]
pub struct Presenter {
    content: String,
    dirty: bool,
    deferred: VecDeque<DeferredEffect>,
}

impl Presenter {
    /// Create an empty presenter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current markup
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replace the markup (phase 1 pending)
    pub fn publish(&mut self, markup: String) {
        self.content = markup;
        self.dirty = true;
    }

    /// Clear the markup
    pub fn reset(&mut self) {
        self.publish(String::new());
    }

    /// Queue an effect to run after the next content commit
    pub fn enqueue(&mut self, effect: DeferredEffect) {
        // Consecutive scrolls collapse into one
        if self.deferred.back() != Some(&effect) {
            self.deferred.push_back(effect);
        }
    }

    /// Whether content is waiting to be committed
    #[must_use]
    pub fn has_pending_content(&self) -> bool {
        self.dirty
    }

    /// Whether effects are waiting to run
    #[must_use]
    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Phase 1: push pending content to the surface
    ///
    /// Returns whether anything was committed.
    pub fn commit_content(&mut self, surface: &mut dyn DisplaySurface) -> bool {
        if !self.dirty {
            return false;
        }
        surface.set_content(&self.content);
        self.dirty = false;
        true
    }

    /// Phase 2: run queued effects
    ///
    /// Does nothing while content is uncommitted. Returns the number of
    /// effects run.
    pub fn run_deferred(&mut self, surface: &mut dyn DisplaySurface) -> usize {
        if self.dirty {
            tracing::debug!(
                queued = self.deferred.len(),
                "Holding deferred effects until content is committed"
            );
            return 0;
        }
        let mut ran = 0;
        while let Some(effect) = self.deferred.pop_front() {
            match effect {
                DeferredEffect::ScrollToEnd => surface.scroll_to_end(),
            }
            ran += 1;
        }
        ran
    }

    /// Both phases back to back (for synchronous callers)
    pub fn present(&mut self, surface: &mut dyn DisplaySurface) -> usize {
        self.commit_content(surface);
        self.run_deferred(surface)
    }
}

/// Surface that records every call, for headless use and tests
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordingSurface {
    /// Markup from the last `set_content`
    pub content: String,
    /// Calls in order: `"set_content"` or `"scroll_to_end"`
    pub calls: Vec<&'static str>,
}

impl RecordingSurface {
    /// Create an empty surface
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scroll requests received
    #[must_use]
    pub fn scroll_count(&self) -> usize {
        self.calls.iter().filter(|c| **c == "scroll_to_end").count()
    }
}

impl DisplaySurface for RecordingSurface {
    fn set_content(&mut self, markup: &str) {
        markup.clone_into(&mut self.content);
        self.calls.push("set_content");
    }

    fn scroll_to_end(&mut self) {
        self.calls.push("scroll_to_end");
    }
}
