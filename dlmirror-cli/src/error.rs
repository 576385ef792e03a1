//! CLI error type.

use std::fmt;

use dlmirror::MirrorError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid command line input.
    Config(String),
    /// Failure inside the mirror library.
    Mirror(MirrorError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Mirror(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Mirror(e) => Some(e),
            CliError::Config(_) => None,
        }
    }
}

impl From<MirrorError> for CliError {
    fn from(e: MirrorError) -> Self {
        CliError::Mirror(e)
    }
}
