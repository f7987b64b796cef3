//! Error types for configuration parsing and initial-condition setup.
//!
//! These errors are recoverable: they carry a descriptive message and the
//! caller decides whether to abort or ask for corrected input.

use std::path::PathBuf;

use thiserror::Error;

use crate::field::GridShape;
use crate::source::SourceKind;

/// Result type alias using [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Broad classification of a [`ConfigError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An option is missing, out of range, or conflicts with another option.
    InvalidArgument,
    /// Supplied field dimensions disagree with the requested grid.
    ShapeMismatch,
    /// A selector demands external data that the source does not provide.
    MissingSource,
    /// Help or version output was requested instead of a run.
    Help,
    /// A configuration file could not be read.
    Io,
}

/// Configuration and initial-condition errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing, out-of-range or conflicting option values.
    ///
    /// The message holds one line per problem found.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A field does not have the shape of the simulation grid.
    #[error("Shape mismatch for {field}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Name of the offending field.
        field: String,
        /// Shape required by the grid.
        expected: String,
        /// Shape actually supplied.
        actual: String,
    },

    /// A selector names a field the source cannot supply.
    #[error("Missing source: no {kind} field with index {index}")]
    MissingSource {
        /// Which quantity was requested.
        kind: SourceKind,
        /// The selector value.
        index: usize,
    },

    /// Help or version text requested on the command line.
    #[error("{0}")]
    Help(String),

    /// Failed to read a configuration file.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Shape mismatch between two grid shapes.
    pub fn shape_mismatch(
        field: impl Into<String>,
        expected: &GridShape,
        actual: &GridShape,
    ) -> Self {
        ConfigError::ShapeMismatch {
            field: field.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Shape mismatch between a buffer and the length its shape requires.
    pub fn length_mismatch(field: impl Into<String>, expected: usize, actual: usize) -> Self {
        ConfigError::ShapeMismatch {
            field: field.into(),
            expected: format!("{} values", expected),
            actual: format!("{} values", actual),
        }
    }

    /// Get the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ConfigError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            ConfigError::MissingSource { .. } => ErrorKind::MissingSource,
            ConfigError::Help(_) => ErrorKind::Help,
            ConfigError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Human-readable diagnostic describing what failed.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Build an error from a `clap` parse failure.
    pub(crate) fn from_clap(err: clap::Error) -> Self {
        use clap::error::ErrorKind as ClapKind;

        match err.kind() {
            ClapKind::DisplayHelp
            | ClapKind::DisplayVersion
            | ClapKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                ConfigError::Help(err.render().to_string())
            }
            _ => {
                let text = err.render().to_string();
                let text = text.trim_end();
                let text = text.strip_prefix("error: ").unwrap_or(text);
                ConfigError::InvalidArgument(text.to_string())
            }
        }
    }
}
