use std::path::PathBuf;

use thiserror::Error as ThisError;

/// Errors that can occur while building or controlling a logger
#[derive(ThisError, Debug)]
pub enum Error {
    /// An output destination could not be opened.
    #[error("Cannot open log output {}: {source}", path.display())]
    Build {
        /// The destination that failed.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Installing the logger as the global default failed.
    #[error("Initialization error: {0}")]
    Init(String),
    /// Changing the level of a running logger failed.
    #[error("Reload error: {0}")]
    Reload(String),
}

impl Error {
    pub(crate) fn build(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Build {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
