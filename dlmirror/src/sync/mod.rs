//! Resumable sync of update and package scopes.
//!
//! Links returned by the API are first written to a [ticket](crate::ticket)
//! and only then downloaded. A scope counts as synced once its manifest
//! exists, so an interrupted run can always be resumed from the tickets left
//! on disk.

pub mod checksum;
mod mirror;
mod progress;
mod resume;

pub use mirror::{current_time, Mirror, MirrorReport};
pub use progress::{ProgressCallback, SyncEvent};
pub use resume::{ResumeOutcome, ScopeSyncer};
