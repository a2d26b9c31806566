//! Error types for the build orchestration domain.
//!
//! The taxonomy follows the build lifecycle: configuration errors are
//! reported before any I/O, range errors after the metadata reads, build
//! errors during graph execution, and store failures bubble up from
//! `tessera-core`. All of them are terminal for a single build
//! invocation; retry is the job of whatever re-invokes the process.

/// The result type used throughout tessera-flow.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while orchestrating a map build.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or contradictory configuration was supplied.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// The requested entry range cannot be built.
    #[error("range error: {message}")]
    Range {
        /// Description of the range problem.
        message: String,
    },

    /// A transform stage failed during graph execution.
    #[error("build failed in stage '{stage}': {message}")]
    Build {
        /// Name of the failing stage.
        stage: String,
        /// Description of the failure.
        message: String,
    },

    /// A serialization error occurred in the row glue.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An error from tessera-core (store I/O and friends).
    #[error("core error: {0}")]
    Core(#[from] tessera_core::Error),
}

impl Error {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a new range error.
    #[must_use]
    pub fn range(message: impl Into<String>) -> Self {
        Self::Range {
            message: message.into(),
        }
    }

    /// Creates a new build error for the named stage.
    #[must_use]
    pub fn build(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Build {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}
