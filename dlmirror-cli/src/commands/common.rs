//! Common helpers shared across CLI commands.

use dlmirror::{MirrorError, MirrorLayout, Platform, ProcessLock, VersionParsePolicy};

use crate::error::CliError;

/// Platforms left after the `--no-ios` / `--no-android` switches.
pub fn platforms(no_ios: bool, no_android: bool) -> Vec<Platform> {
    Platform::ALL
        .into_iter()
        .filter(|p| match p {
            Platform::Ios => !no_ios,
            Platform::Android => !no_android,
        })
        .collect()
}

pub fn version_policy(strict: bool) -> VersionParsePolicy {
    if strict {
        VersionParsePolicy::Fail
    } else {
        VersionParsePolicy::Skip
    }
}

/// Take the mirror lock, or report that another run holds it.
///
/// `None` means the command should stop without doing anything.
pub fn acquire_lock(layout: &MirrorLayout) -> Result<Option<ProcessLock>, CliError> {
    match ProcessLock::acquire(layout.lock_file()) {
        Ok(lock) => Ok(Some(lock)),
        Err(MirrorError::LockHeld { path }) => {
            println!("An instance is already running");
            if let Some(holder) = ProcessLock::holder(&path) {
                println!("  Lock held by pid {} ({})", holder.pid, path.display());
            }
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
