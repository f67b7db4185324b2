//! Error types for topicwiki.
//!
//! Library crates use [`TopicWikiError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics and maps it to
//! a process exit code with [`TopicWikiError::exit_code`].

use std::path::PathBuf;

/// Exit code for a successful run.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for any execution failure not covered by a more specific code.
pub const EXIT_EXECUTION_ERROR: u8 = 1;
/// Exit code for bad arguments, paths, or configuration.
pub const EXIT_CONFIG_ERROR: u8 = 2;
/// Exit code when the AI service cannot be reached at all.
pub const EXIT_AI_UNAVAILABLE: u8 = 3;

/// Top-level error type for all topicwiki operations.
#[derive(Debug, thiserror::Error)]
pub enum TopicWikiError {
    /// Configuration, argument, or path validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The AI service is not available for this run.
    #[error("AI service unavailable: {reason}")]
    AiUnavailable { reason: String },

    /// A generation phase produced no usable output.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Writing results into the wiki failed.
    #[error("wiki integration failed: {0}")]
    Integration(String),

    /// Website regeneration failed.
    #[error("website regeneration failed: {0}")]
    Website(String),

    /// Network/HTTP error while talking to the AI service.
    #[error("network error: {0}")]
    Network(String),

    /// JSON or other content parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TopicWikiError>;

impl TopicWikiError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an AI-unavailable error with the reason reported by the service.
    pub fn ai_unavailable(reason: impl Into<String>) -> Self {
        Self::AiUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error (0 success, 1 execution, 2 config, 3 AI unavailable).
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config { .. } | Self::Validation { .. } => EXIT_CONFIG_ERROR,
            Self::AiUnavailable { .. } => EXIT_AI_UNAVAILABLE,
            _ => EXIT_EXECUTION_ERROR,
        }
    }
}
