//! CLI error types.

use std::fmt;
use std::path::PathBuf;

use rtitiles::{FetchError, PyramidError};

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Failed to read a file.
    Io { path: PathBuf, source: std::io::Error },

    /// The image description could not be parsed.
    Description { path: PathBuf, message: String },

    /// The pyramid could not be built.
    Pyramid(PyramidError),

    /// The HTTP client could not be set up.
    Fetch(FetchError),

    /// A command-line argument is out of range.
    InvalidArgument(String),

    /// Failed to create the Tokio runtime.
    RuntimeCreation(String),

    /// Failed to install the log subscriber.
    Logging(String),

    /// Some tiles could not be fetched.
    FailedTiles(usize),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::FailedTiles(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            CliError::Description { path, message } => {
                write!(f, "Invalid image description {}: {}", path.display(), message)
            }
            CliError::Pyramid(e) => write!(f, "Failed to build pyramid: {}", e),
            CliError::Fetch(e) => write!(f, "Failed to set up fetcher: {}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::RuntimeCreation(msg) => {
                write!(f, "Failed to create Tokio runtime: {}", msg)
            }
            CliError::Logging(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::FailedTiles(count) => write!(f, "{} tile(s) failed to load", count),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io { source, .. } => Some(source),
            CliError::Pyramid(e) => Some(e),
            CliError::Fetch(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PyramidError> for CliError {
    fn from(e: PyramidError) -> Self {
        CliError::Pyramid(e)
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        CliError::Fetch(e)
    }
}
