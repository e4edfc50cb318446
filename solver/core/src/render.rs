//! Render Adapters
//!
//! Turn raw answer text into display markup. Adapters are pure and stateless;
//! the engine calls them on every chunk, so they must not block.
//!
//! Adapters report failure through [`RenderError`]. The engine never surfaces
//! those errors: [`render_or_raw`] falls back to the raw text instead.

use pulldown_cmark::{html, Options, Parser};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors an adapter may report for input it cannot render
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Input exceeds the adapter's size limit
    #[error("render input too large: {len} bytes (limit {limit})")]
    InputTooLarge {
        /// Input size in bytes
        len: usize,
        /// Configured limit in bytes
        limit: usize,
    },

    /// Input the adapter refuses to process
    #[error("malformed render input: {0}")]
    Malformed(String),
}

/// Converts raw text to display markup
pub trait RenderAdapter: Send + Sync {
    /// Adapter name (for logging)
    fn name(&self) -> &str;

    /// Render `text` to markup
    fn render(&self, text: &str) -> Result<String, RenderError>;
}

/// Render with graceful degradation: on failure the raw text is returned verbatim
pub fn render_or_raw(adapter: &dyn RenderAdapter, text: &str) -> String {
    match adapter.render(text) {
        Ok(markup) => markup,
        Err(e) => {
            tracing::warn!(
                adapter = adapter.name(),
                error = %e,
                "Render failed, displaying raw text"
            );
            text.to_string()
        }
    }
}

/// Markdown to HTML via pulldown-cmark
#[derive(Clone, Debug, Default)]
pub struct MarkdownRenderer {
    /// Reject inputs larger than this many bytes (None = no limit)
    max_input_bytes: Option<usize>,
}

impl MarkdownRenderer {
    /// Create a renderer without an input limit
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject inputs larger than `limit` bytes
    #[must_use]
    pub fn with_max_input_bytes(mut self, limit: usize) -> Self {
        self.max_input_bytes = Some(limit);
        self
    }
}

impl RenderAdapter for MarkdownRenderer {
    fn name(&self) -> &str {
        "markdown"
    }

    fn render(&self, text: &str) -> Result<String, RenderError> {
        if let Some(limit) = self.max_input_bytes {
            if text.len() > limit {
                return Err(RenderError::InputTooLarge {
                    len: text.len(),
                    limit,
                });
            }
        }
        if text.is_empty() {
            return Ok(String::new());
        }

        let options =
            Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
        let parser = Parser::new_ext(text, options);

        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, parser);
        Ok(out)
    }
}

/// Escapes text for display without interpreting markdown
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainRenderer;

impl RenderAdapter for PlainRenderer {
    fn name(&self) -> &str {
        "plain"
    }

    fn render(&self, text: &str) -> Result<String, RenderError> {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        Ok(out)
    }
}

/// Selectable adapter, as named in configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    /// [`MarkdownRenderer`]
    #[default]
    Markdown,
    /// [`PlainRenderer`]
    Plain,
}

impl RendererKind {
    /// Build the adapter for this kind
    #[must_use]
    pub fn build(self) -> Box<dyn RenderAdapter> {
        match self {
            Self::Markdown => Box::new(MarkdownRenderer::new()),
            Self::Plain => Box::new(PlainRenderer),
        }
    }
}

impl std::fmt::Display for RendererKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Plain => write!(f, "plain"),
        }
    }
}

impl std::str::FromStr for RendererKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "plain" | "text" => Ok(Self::Plain),
            other => Err(format!("unknown renderer '{other}' (expected markdown or plain)")),
        }
    }
}
