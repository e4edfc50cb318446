//! Engine Inputs
//!
//! Everything that can happen to the engine, as plain data. Backend stream
//! events and caller actions share one enum so a single owner can apply them
//! in arrival order.
//!
//! Inputs serialize as internally tagged JSON, one object per event:
//!
//! ```json
//! {"type":"stream_start"}
//! {"type":"stream_chunk","stream":1,"token":"Hel"}
//! {"type":"stream_complete","stream":1,"text":"Hello"}
//! {"type":"stream_error","error":{"code":"401"}}
//! {"type":"select_history","index":1}
//! ```
//!
//! Stream events carry the [`StreamId`] they were issued against. Unstamped
//! events are dropped while a stream is live; only an unstamped error with
//! nothing live is accepted, as a failure before any stream started.

use serde::{Deserialize, Serialize};

use crate::controller::StreamId;
use crate::error_state::ErrorDetail;

/// An input to the engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineInput {
    /// Backend is about to stream a new answer
    StreamStart,

    /// Incremental token
    StreamChunk {
        /// Stream the token belongs to
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream: Option<StreamId>,
        /// Token text
        token: String,
    },

    /// Backend finished the answer
    StreamComplete {
        /// Stream being completed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream: Option<StreamId>,
        /// Final answer text
        text: String,
    },

    /// Backend or request failure
    StreamError {
        /// Failed stream (none for failures before any stream started)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream: Option<StreamId>,
        /// Error detail
        error: ErrorDetail,
    },

    /// User picked a past answer
    SelectHistory {
        /// Index into the history log (0 = newest)
        index: usize,
    },

    /// User changed the keep-context preference
    SetKeepContext {
        /// New preference
        enabled: bool,
    },

    /// User asked to regenerate the newest answer in place
    RequestOverwrite,

    /// User toggled the raw error details
    ToggleErrorDetails,
}

impl EngineInput {
    /// Whether this input comes from the backend stream
    #[must_use]
    pub fn is_stream_event(&self) -> bool {
        matches!(
            self,
            Self::StreamStart
                | Self::StreamChunk { .. }
                | Self::StreamComplete { .. }
                | Self::StreamError { .. }
        )
    }

    /// Short name for logging
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::StreamStart => "stream_start",
            Self::StreamChunk { .. } => "stream_chunk",
            Self::StreamComplete { .. } => "stream_complete",
            Self::StreamError { .. } => "stream_error",
            Self::SelectHistory { .. } => "select_history",
            Self::SetKeepContext { .. } => "set_keep_context",
            Self::RequestOverwrite => "request_overwrite",
            Self::ToggleErrorDetails => "toggle_error_details",
        }
    }
}

/// Token stream events from a backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamingToken {
    /// A token from the response
    Token(String),
    /// Response completed successfully
    Complete {
        /// The complete message (may differ from concatenated tokens)
        message: String,
    },
    /// Error occurred during streaming
    Error(ErrorDetail),
}

impl StreamingToken {
    /// Whether this token ends the stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Token(_))
    }

    /// Convert to an engine input stamped with `stream`
    #[must_use]
    pub fn into_input(self, stream: StreamId) -> EngineInput {
        match self {
            Self::Token(token) => EngineInput::StreamChunk {
                stream: Some(stream),
                token,
            },
            Self::Complete { message } => EngineInput::StreamComplete {
                stream: Some(stream),
                text: message,
            },
            Self::Error(error) => EngineInput::StreamError {
                stream: Some(stream),
                error,
            },
        }
    }
}
