//! Error types for mirror operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::version::{GameVersion, Generation, ProtocolVersion};

/// Result type for mirror operations.
pub type MirrorResult<T> = Result<T, MirrorError>;

/// Errors that can occur while mirroring a DLAPI server.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Failed to read, write or create a file or directory.
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    /// A JSON file on disk could not be parsed or serialized.
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Transport-level failure (connect, reset, timeout, body read).
    ///
    /// Retriable, as is [`MirrorError::Body`].
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    /// The connection failed or stalled while a download body was read.
    ///
    /// Retriable like [`MirrorError::Http`].
    #[error("reading the body of {url} failed: {source}")]
    Body { url: String, source: io::Error },

    /// The server answered with a status other than 200 or a redirect.
    #[error("'{url}' returned {status}")]
    Remote { url: String, status: u16 },

    /// The redirect chain exceeded the hop limit.
    #[error("'{url}' does not properly set up its redirect")]
    TooManyRedirects { url: String },

    /// A redirect response carried no usable Location header.
    #[error("'{url}' says redirect but has no Location header")]
    MissingLocation { url: String },

    /// A URL could not be parsed or resolved.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A response body did not have the expected shape.
    #[error("unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    /// Downloaded bytes did not match the declared checksum.
    #[error("{algorithm} does not match for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        algorithm: &'static str,
        expected: String,
        actual: String,
    },

    /// The presigned links in a ticket are no longer valid.
    #[error("links expired, delete {} and try again", path.display())]
    TicketExpired { path: PathBuf },

    /// A ticket was written by an incompatible version of this tool.
    #[error("unsupported ticket format {found} in {}", path.display())]
    TicketFormat { path: PathBuf, found: u32 },

    /// The server speaks an incompatible DLAPI protocol.
    #[error("mirror only provides protocol {found}, but {required} is required")]
    ProtocolVersionMismatch {
        found: ProtocolVersion,
        required: ProtocolVersion,
    },

    /// The latest synced versions of the platforms disagree.
    #[error("latest version discrepancy detected (iOS {ios}, Android {android})")]
    VersionDiscrepancy {
        ios: GameVersion,
        android: GameVersion,
    },

    /// A version string was not of the form `MAJ.MIN`.
    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    /// The tree was written by a newer release of this tool.
    #[error("layout generation {found} is newer than the supported {supported}")]
    GenerationTooNew {
        found: Generation,
        supported: Generation,
    },

    /// Another mirror run holds the process lock.
    #[error("an instance is already running (lock file {})", path.display())]
    LockHeld { path: PathBuf },

    /// A zip archive could not be read.
    #[error("failed to read archive {}: {reason}", path.display())]
    Archive { path: PathBuf, reason: String },

    /// An archive entry name tried to escape the archive namespace.
    #[error("invalid archive entry '{0}'")]
    InvalidEntry(String),

    /// The requested entry is not in the archive index.
    #[error("entry '{0}' not found")]
    EntryNotFound(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The decrypt backend failed.
    #[error("failed to decrypt {name}: {reason}")]
    Decrypt { name: String, reason: String },

    /// No decrypt backend is available on this system.
    #[error("no decrypt backend available")]
    NoDecryptProvider,
}

impl MirrorError {
    /// Whether the transport may retry the operation that produced this error.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Body { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
