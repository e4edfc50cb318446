//! Error State
//!
//! User-facing error banner raised when a stream (or the request before it)
//! fails. Raw backend details are kept behind an opt-in "show details" toggle.
//!
//! Only transport, credential and quota failures reach this state. Render
//! failures are recovered where they happen (see [`crate::render`]).

use serde::{Deserialize, Serialize};

/// Classification of a failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Backend unreachable or the request failed
    Transport,
    /// Credentials rejected
    Auth,
    /// Resource exhausted
    Quota,
    /// Render adapter rejected its input (recovered locally)
    Render,
}

impl ErrorKind {
    /// Whether this kind is shown to the user
    #[must_use]
    pub fn is_surfaced(self) -> bool {
        !matches!(self, Self::Render)
    }

    /// Banner icon
    #[must_use]
    pub fn icon(self) -> &'static str {
        match self {
            Self::Transport => "❌",
            Self::Auth => "🚫",
            Self::Quota => "💸",
            Self::Render => "⚠️",
        }
    }

    /// Banner title
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Transport => "Connection failed",
            Self::Auth => "Invalid API key",
            Self::Quota => "Quota exhausted",
            Self::Render => "Display error",
        }
    }

    /// Banner description
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Transport => "The backend could not be reached or the request failed.",
            Self::Auth => "The backend rejected the configured credentials. Check your API key.",
            Self::Quota => "The account has run out of quota or balance.",
            Self::Render => "The answer could not be formatted and is shown as plain text.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Auth => write!(f, "auth"),
            Self::Quota => write!(f, "quota"),
            Self::Render => write!(f, "render"),
        }
    }
}

/// Error payload as delivered by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    /// Structured error with a status or error code
    Coded {
        /// Status/error code, e.g. `"401"`
        code: String,
        /// Optional human-readable message
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Free-form error message
    Message(String),
}

impl ErrorDetail {
    /// Free-form detail
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Coded detail without a message
    pub fn code(code: impl Into<String>) -> Self {
        Self::Coded {
            code: code.into(),
            message: None,
        }
    }

    /// Raw text kept behind the "show details" toggle
    #[must_use]
    pub fn raw(&self) -> String {
        match self {
            Self::Coded {
                code,
                message: Some(message),
            } => format!("[{code}] {message}"),
            Self::Coded { code, message: None } => format!("[{code}]"),
            Self::Message(message) => message.clone(),
        }
    }
}

impl From<&str> for ErrorDetail {
    fn from(message: &str) -> Self {
        Self::message(message)
    }
}

impl From<String> for ErrorDetail {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

const AUTH_CODES: &[&str] = &["401", "403"];
const QUOTA_CODES: &[&str] = &["402", "429"];
const AUTH_MARKERS: &[&str] = &["401", "unauthorized", "invalid", "incorrect"];
const QUOTA_MARKERS: &[&str] = &["quota", "429", "insufficient", "余额不足"];

fn classify_text(text: &str) -> Option<ErrorKind> {
    let lower = text.to_lowercase();
    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        Some(ErrorKind::Auth)
    } else if QUOTA_MARKERS.iter().any(|m| lower.contains(m)) {
        Some(ErrorKind::Quota)
    } else {
        None
    }
}

/// Classify a backend error detail
///
/// Codes are checked first, then the message text. Anything unrecognized is a
/// transport failure. Never returns [`ErrorKind::Render`].
#[must_use]
pub fn classify(detail: &ErrorDetail) -> ErrorKind {
    match detail {
        ErrorDetail::Coded { code, message } => {
            let code = code.trim();
            if AUTH_CODES.contains(&code) {
                ErrorKind::Auth
            } else if QUOTA_CODES.contains(&code) {
                ErrorKind::Quota
            } else {
                message
                    .as_deref()
                    .and_then(classify_text)
                    .unwrap_or(ErrorKind::Transport)
            }
        }
        ErrorDetail::Message(message) => classify_text(message).unwrap_or(ErrorKind::Transport),
    }
}

/// The error banner
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorState {
    /// Whether the banner is shown
    pub visible: bool,
    /// Classification of the last raised error
    pub kind: Option<ErrorKind>,
    /// Banner icon
    pub icon: String,
    /// Banner title
    pub title: String,
    /// Banner description
    pub description: String,
    /// Raw backend detail
    pub raw_detail: String,
    /// Whether the raw detail is expanded
    pub details_expanded: bool,
}

impl Default for ErrorState {
    fn default() -> Self {
        Self {
            visible: false,
            kind: None,
            icon: "⚠️".to_string(),
            title: "Something went wrong".to_string(),
            description: "An unknown error occurred.".to_string(),
            raw_detail: String::new(),
            details_expanded: false,
        }
    }
}

impl ErrorState {
    /// Show the banner for a classified failure
    ///
    /// Returns false (and leaves the banner untouched) for kinds that are not
    /// surfaced.
    pub fn raise(&mut self, kind: ErrorKind, raw_detail: String) -> bool {
        if !kind.is_surfaced() {
            return false;
        }
        self.visible = true;
        self.kind = Some(kind);
        kind.icon().clone_into(&mut self.icon);
        kind.title().clone_into(&mut self.title);
        kind.description().clone_into(&mut self.description);
        self.raw_detail = raw_detail;
        self.details_expanded = false;
        true
    }

    /// Hide the banner
    ///
    /// Returns whether it was visible.
    pub fn hide(&mut self) -> bool {
        let was_visible = self.visible;
        self.visible = false;
        self.details_expanded = false;
        was_visible
    }

    /// Flip the "show details" toggle
    ///
    /// Only meaningful while the banner is visible; returns the new state.
    pub fn toggle_details(&mut self) -> bool {
        if self.visible {
            self.details_expanded = !self.details_expanded;
        }
        self.details_expanded
    }
}
