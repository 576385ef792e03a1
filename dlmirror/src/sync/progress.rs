//! Progress reporting for sync operations.

use std::fmt;
use std::path::PathBuf;

use crate::api::format_expiry;
use crate::layout::Platform;
use crate::ticket::TicketScope;
use crate::version::ProtocolVersion;

/// Something observable that happened during a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// `publicinfo` answered.
    ServerInfo {
        url: String,
        protocol: ProtocolVersion,
        game_version: String,
        link_lifetime: u64,
    },
    /// A pending ticket is being resumed.
    ResumingScope {
        platform: Platform,
        scope: TicketScope,
    },
    /// A sub-scope already has its manifest.
    SkippedScope { dest: PathBuf },
    /// A numbered archive is already on disk.
    SkippedFile { dest: PathBuf },
    /// Archive `index` of `total` in a sub-scope is being fetched.
    Downloading {
        index: usize,
        total: usize,
        dest: PathBuf,
    },
    /// A ticket finished and was removed.
    ScopeComplete {
        platform: Platform,
        scope: TicketScope,
    },
    /// Tickets were written for new links.
    Prepared {
        platform: Platform,
        scope: TicketScope,
        links: usize,
    },
    /// The archive index of a version is being rebuilt.
    BuildingIndex { platform: Platform, version: String },
    /// `release_info.json` is being refreshed.
    FetchingReleaseInfo,
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::ServerInfo {
                url,
                protocol,
                game_version,
                link_lifetime,
            } => write!(
                f,
                "Mirror {} (protocol {}): game version {}, link expiry {}",
                url,
                protocol,
                game_version,
                format_expiry(*link_lifetime)
            ),
            SyncEvent::ResumingScope { platform, scope } => {
                write!(f, "Resuming {} on {}", describe(scope), platform)
            }
            SyncEvent::SkippedScope { dest } => write!(f, "Already synced: {}", dest.display()),
            SyncEvent::SkippedFile { dest } => write!(f, "Already present: {}", dest.display()),
            SyncEvent::Downloading { index, total, dest } => {
                write!(f, "Downloading file {}/{} {}", index, total, dest.display())
            }
            SyncEvent::ScopeComplete { platform, scope } => {
                write!(f, "Finished {} on {}", describe(scope), platform)
            }
            SyncEvent::Prepared {
                platform,
                scope,
                links,
            } => write!(f, "Queued {} links for {} on {}", links, describe(scope), platform),
            SyncEvent::BuildingIndex { platform, version } => {
                write!(f, "Building archive index for {} {}", platform, version)
            }
            SyncEvent::FetchingReleaseInfo => f.write_str("Downloading release_info.json keys"),
        }
    }
}

fn describe(scope: &TicketScope) -> String {
    match scope {
        TicketScope::Update { version } => format!("update to {}", version),
        TicketScope::Batch {
            version,
            package_type,
        } => format!("package type {} of {}", package_type, version),
    }
}

/// Callback receiving every [`SyncEvent`] of a run.
pub type ProgressCallback = Box<dyn Fn(&SyncEvent)>;

/// Log an event through `tracing`, then hand it to the callback if any.
///
/// Events are user-facing progress, so they only reach the log at debug
/// level; the callback decides how to present them.
pub(crate) fn emit(callback: Option<&ProgressCallback>, event: SyncEvent) {
    tracing::debug!(%event);
    if let Some(callback) = callback {
        callback(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_display() {
        let event = SyncEvent::Downloading {
            index: 2,
            total: 5,
            dest: PathBuf::from("iOS/update/59.4/2.zip"),
        };
        assert_eq!(event.to_string(), "Downloading file 2/5 iOS/update/59.4/2.zip");

        let event = SyncEvent::ScopeComplete {
            platform: Platform::Android,
            scope: TicketScope::Batch {
                version: "59.4".to_string(),
                package_type: 4,
            },
        };
        assert_eq!(event.to_string(), "Finished package type 4 of 59.4 on Android");
    }

    #[test]
    fn test_emit_reaches_callback() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let callback: ProgressCallback = Box::new(move |e| sink.borrow_mut().push(e.clone()));

        emit(Some(&callback), SyncEvent::FetchingReleaseInfo);
        emit(None, SyncEvent::FetchingReleaseInfo);

        assert_eq!(seen.borrow().as_slice(), &[SyncEvent::FetchingReleaseInfo]);
    }
}
