//! Engine Driver
//!
//! Runs a [`StreamController`] on its own task so that stream events and
//! caller actions are applied strictly in arrival order. Callers talk to it
//! through a cloneable [`EngineHandle`].
//!
//! After each command the driver commits display content, yields to the
//! runtime, then runs deferred effects. A scroll queued by a chunk therefore
//! always lands after the markup it belongs to.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::controller::{EngineSnapshot, EventOutcome, StreamController, StreamId};
use crate::display::{DisplaySurface, StateChange};
use crate::error_state::ErrorDetail;
use crate::events::{EngineInput, StreamingToken};

/// Capacity of the command channel
const COMMAND_BUFFER: usize = 256;

/// Reported when a token channel closes before a terminal token
pub const DISCONNECTED_MESSAGE: &str = "stream disconnected unexpectedly";

/// Errors from an [`EngineHandle`]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// The driver task has stopped
    #[error("engine driver is not running")]
    Closed,
}

enum Command {
    Input {
        input: EngineInput,
        reply: Option<oneshot::Sender<EventOutcome>>,
    },
    Attach {
        tokens: mpsc::Receiver<StreamingToken>,
        reply: oneshot::Sender<StreamId>,
    },
    Snapshot(oneshot::Sender<EngineSnapshot>),
    Subscribe(oneshot::Sender<mpsc::Receiver<StateChange>>),
    Shutdown,
}

/// Cloneable handle to a running engine
#[derive(Clone, Debug)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
}

impl EngineHandle {
    /// Apply an input and wait for its outcome
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Closed`] if the driver has stopped.
    pub async fn send(&self, input: EngineInput) -> Result<EventOutcome, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Input {
                input,
                reply: Some(reply),
            })
            .await
            .map_err(|_| DriverError::Closed)?;
        rx.await.map_err(|_| DriverError::Closed)
    }

    /// Queue an input without waiting
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Closed`] if the driver has stopped.
    pub async fn post(&self, input: EngineInput) -> Result<(), DriverError> {
        self.tx
            .send(Command::Input { input, reply: None })
            .await
            .map_err(|_| DriverError::Closed)
    }

    /// Start a stream and feed it from a token channel
    ///
    /// Tokens are stamped with the new stream's id. If the channel closes
    /// without a completion or error, the stream fails with
    /// [`DISCONNECTED_MESSAGE`]. A previously attached channel is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Closed`] if the driver has stopped.
    pub async fn attach_stream(
        &self,
        tokens: mpsc::Receiver<StreamingToken>,
    ) -> Result<StreamId, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Attach { tokens, reply })
            .await
            .map_err(|_| DriverError::Closed)?;
        rx.await.map_err(|_| DriverError::Closed)
    }

    /// Current engine state
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Closed`] if the driver has stopped.
    pub async fn snapshot(&self) -> Result<EngineSnapshot, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot(reply))
            .await
            .map_err(|_| DriverError::Closed)?;
        rx.await.map_err(|_| DriverError::Closed)
    }

    /// Subscribe to state change notifications
    ///
    /// A subscriber that stops reading is disconnected once its buffer fills.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Closed`] if the driver has stopped.
    pub async fn subscribe(&self) -> Result<mpsc::Receiver<StateChange>, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Subscribe(reply))
            .await
            .map_err(|_| DriverError::Closed)?;
        rx.await.map_err(|_| DriverError::Closed)
    }

    /// Stop the driver after already-queued commands
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Closed`] if the driver has already stopped.
    pub async fn shutdown(&self) -> Result<(), DriverError> {
        self.tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| DriverError::Closed)
    }
}

/// Owns the controller and its display surface
pub struct EngineDriver {
    controller: StreamController,
    surface: Box<dyn DisplaySurface + Send>,
    rx: mpsc::Receiver<Command>,
    self_tx: mpsc::WeakSender<Command>,
    forwarder: Option<JoinHandle<()>>,
}

impl EngineDriver {
    /// Spawn the driver on the current runtime
    ///
    /// The task ends after [`EngineHandle::shutdown`] or once every handle is
    /// dropped.
    pub fn spawn(
        controller: StreamController,
        surface: Box<dyn DisplaySurface + Send>,
    ) -> (EngineHandle, JoinHandle<StreamController>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let driver = Self {
            controller,
            surface,
            rx,
            self_tx: tx.downgrade(),
            forwarder: None,
        };
        let task = tokio::spawn(driver.run());
        (EngineHandle { tx }, task)
    }

    async fn run(mut self) -> StreamController {
        tracing::debug!("Engine driver started");

        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Input { input, reply } => {
                    let outcome = self.apply(input);
                    if let Some(reply) = reply {
                        let _ = reply.send(outcome);
                    }
                }
                Command::Attach { tokens, reply } => {
                    let stream = self.attach(tokens);
                    let _ = reply.send(stream);
                }
                Command::Snapshot(reply) => {
                    let _ = reply.send(self.controller.snapshot());
                }
                Command::Subscribe(reply) => {
                    let _ = reply.send(self.controller.subscribe());
                }
                Command::Shutdown => {
                    tracing::debug!("Engine driver shutting down");
                    break;
                }
            }

            self.flush_display().await;
        }

        self.stop_forwarder();
        tracing::debug!("Engine driver stopped");
        self.controller
    }

    fn apply(&mut self, input: EngineInput) -> EventOutcome {
        let name = input.name();
        if matches!(input, EngineInput::StreamStart) {
            // A caller-driven start supersedes any attached channel
            self.stop_forwarder();
        }
        let outcome = self.controller.apply(input);
        tracing::trace!(input = name, outcome = ?outcome, "Applied engine input");
        outcome
    }

    fn attach(&mut self, tokens: mpsc::Receiver<StreamingToken>) -> StreamId {
        self.stop_forwarder();
        let stream = self.controller.start();

        let Some(tx) = self.self_tx.upgrade() else {
            // Only reachable while shutting down
            return stream;
        };
        self.forwarder = Some(tokio::spawn(forward_tokens(stream, tokens, tx)));
        stream
    }

    fn stop_forwarder(&mut self) {
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
    }

    /// Phase 1, yield, phase 2
    async fn flush_display(&mut self) {
        self.controller.commit_content(self.surface.as_mut());
        if self.controller.has_deferred() {
            tokio::task::yield_now().await;
            self.controller.run_deferred(self.surface.as_mut());
        }
    }
}

async fn forward_tokens(
    stream: StreamId,
    mut tokens: mpsc::Receiver<StreamingToken>,
    tx: mpsc::Sender<Command>,
) {
    while let Some(token) = tokens.recv().await {
        let terminal = token.is_terminal();
        let input = token.into_input(stream);
        if tx.send(Command::Input { input, reply: None }).await.is_err() {
            return;
        }
        if terminal {
            return;
        }
    }

    tracing::warn!(stream = %stream, "Token channel closed before completion");
    let input = EngineInput::StreamError {
        stream: Some(stream),
        error: ErrorDetail::message(DISCONNECTED_MESSAGE),
    };
    let _ = tx.send(Command::Input { input, reply: None }).await;
}
