//! TOML Configuration File Support
//!
//! Loads engine settings from `$XDG_CONFIG_HOME/q-solver/solver.toml`
//! (typically `~/.config/q-solver/solver.toml`).
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [context]
//! keep_context = true
//!
//! [history]
//! max_entries = 50
//!
//! [render]
//! renderer = "markdown"
//! ```
//!
//! # Environment Variables
//!
//! - `SOLVER_KEEP_CONTEXT` (`true`/`false`/`1`/`0`)
//! - `SOLVER_MAX_HISTORY` (`0` = unbounded)
//! - `SOLVER_RENDERER` (`markdown` or `plain`)
//!
//! A set but invalid variable fails the load with
//! [`ConfigError::ValidationError`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::RendererKind;

/// Environment variable for the keep-context preference
pub const ENV_KEEP_CONTEXT: &str = "SOLVER_KEEP_CONTEXT";
/// Environment variable for the history bound
pub const ENV_MAX_HISTORY: &str = "SOLVER_MAX_HISTORY";
/// Environment variable for the render adapter
pub const ENV_RENDERER: &str = "SOLVER_RENDERER";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Where the effective configuration last came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Command-line argument
    Cli,
    /// Environment variable
    Env,
    /// TOML configuration file
    File,
    /// Built-in default
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[context]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextToml {
    /// Continue the newest answer instead of starting a new entry
    pub keep_context: Option<bool>,
}

/// `[history]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryToml {
    /// Maximum retained entries (0 = unbounded)
    pub max_entries: Option<usize>,
}

/// `[render]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderToml {
    /// Render adapter name
    pub renderer: Option<String>,
}

/// Root of `solver.toml`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverToml {
    /// Context policy defaults
    pub context: ContextToml,
    /// History log settings
    pub history: HistoryToml,
    /// Display settings
    pub render: RenderToml,
}

// =============================================================================
// Effective Configuration
// =============================================================================

/// Effective engine configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolverConfig {
    /// Initial keep-context preference
    pub keep_context: bool,
    /// History bound (0 = unbounded)
    pub max_history_entries: usize,
    /// Render adapter
    pub renderer: RendererKind,
    /// File the configuration was read from
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            keep_context: false,
            max_history_entries: 0,
            renderer: RendererKind::Markdown,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl SolverConfig {
    /// Where the configuration last came from
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Override the recorded source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Default configuration file path
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("q-solver").join("solver.toml"))
}

/// Load configuration from the default path, then the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or an
/// environment variable holds an invalid value.
pub fn load_config() -> Result<SolverConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then the environment
///
/// A missing file is not an error.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or holds an
/// invalid value.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<SolverConfig, ConfigError> {
    let mut config = load_file_config(path)?;
    apply_env_config(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

fn load_file_config(path: Option<PathBuf>) -> Result<SolverConfig, ConfigError> {
    let mut config = SolverConfig::default();

    let Some(config_path) = path else {
        return Ok(config);
    };
    if !config_path.exists() {
        tracing::debug!(
            path = %config_path.display(),
            "Config file not found, using defaults"
        );
        return Ok(config);
    }

    let toml_content =
        std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
            path: config_path.clone(),
            source: e,
        })?;
    let toml_config: SolverToml = toml::from_str(&toml_content)?;
    apply_toml_config(&mut config, &toml_config)?;
    config.config_file_path = Some(config_path.clone());
    config.source = ConfigSource::File;

    tracing::info!(
        path = %config_path.display(),
        "Loaded configuration from file"
    );
    Ok(config)
}

fn apply_toml_config(config: &mut SolverConfig, toml: &SolverToml) -> Result<(), ConfigError> {
    if let Some(keep) = toml.context.keep_context {
        config.keep_context = keep;
    }
    if let Some(max) = toml.history.max_entries {
        config.max_history_entries = max;
    }
    if let Some(ref name) = toml.render.renderer {
        config.renderer = name.parse().map_err(ConfigError::ValidationError)?;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Apply environment overrides read through `lookup`
///
/// An unparseable value is an error, the same as an invalid file value.
fn apply_env_config<F>(config: &mut SolverConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_KEEP_CONTEXT) {
        config.keep_context = parse_bool(&value).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "{ENV_KEEP_CONTEXT}: expected true/false/1/0, got '{value}'"
            ))
        })?;
        config.source = ConfigSource::Env;
    }
    if let Some(value) = lookup(ENV_MAX_HISTORY) {
        config.max_history_entries = value
            .trim()
            .parse::<usize>()
            .map_err(|e| ConfigError::ValidationError(format!("{ENV_MAX_HISTORY}: {e}")))?;
        config.source = ConfigSource::Env;
    }
    if let Some(value) = lookup(ENV_RENDERER) {
        config.renderer = value
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("{ENV_RENDERER}: {e}")))?;
        config.source = ConfigSource::Env;
    }
    Ok(())
}

// =============================================================================
// CLI Overrides
// =============================================================================

/// Command-line overrides, applied last
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Keep-context preference
    pub keep_context: Option<bool>,
    /// History bound
    pub max_history_entries: Option<usize>,
    /// Render adapter
    pub renderer: Option<RendererKind>,
}

impl ConfigOverrides {
    /// No overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the keep-context preference
    #[must_use]
    pub fn with_keep_context(mut self, keep: bool) -> Self {
        self.keep_context = Some(keep);
        self
    }

    /// Override the history bound
    #[must_use]
    pub fn with_max_history_entries(mut self, max: usize) -> Self {
        self.max_history_entries = Some(max);
        self
    }

    /// Override the render adapter
    #[must_use]
    pub fn with_renderer(mut self, renderer: RendererKind) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keep_context.is_none()
            && self.max_history_entries.is_none()
            && self.renderer.is_none()
    }

    /// Apply overrides to a loaded configuration
    pub fn apply(&self, config: &mut SolverConfig) {
        if self.is_empty() {
            return;
        }
        if let Some(keep) = self.keep_context {
            config.keep_context = keep;
        }
        if let Some(max) = self.max_history_entries {
            config.max_history_entries = max;
        }
        if let Some(renderer) = self.renderer {
            config.renderer = renderer;
        }
        config.source = ConfigSource::Cli;
    }
}

// =============================================================================
// Tests
// =============================================================================
