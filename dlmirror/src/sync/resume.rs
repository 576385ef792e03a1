//! Ticket preparation and resumption.
//!
//! ```text
//! prepare ──► ticket on disk ──► resume
//!                                  │
//!                for each sub-scope without manifest:
//!                  fetch n.zip ─► verify ─► rename into place
//!                  write manifest
//!                                  │
//!                update version index / package id list
//!                delete ticket
//! ```
//!
//! Every step is restartable: a killed run leaves at most one half-written
//! temporary file, which the next run never looks at.

use std::path::{Path, PathBuf};

use super::checksum;
use super::progress::{emit, ProgressCallback, SyncEvent};
use crate::api::DownloadLink;
use crate::error::{MirrorError, MirrorResult};
use crate::layout::{archive_name, MirrorLayout, PackageType, Platform};
use crate::manifest::{PackageIdList, ScopeManifest, VersionIndex};
use crate::storage::{ensure_dir, write_atomic};
use crate::ticket::{SubScope, Ticket, TicketFile, TicketScope};
use crate::transport::HttpTransport;
use crate::version::GameVersion;

/// Result of resuming one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// No ticket was pending for the scope.
    NoTicket,
    /// The ticket was fully processed and removed.
    Completed {
        /// Sub-scopes that had no manifest yet.
        scopes_synced: usize,
        /// Archives actually downloaded.
        files_fetched: usize,
    },
}

/// Prepares and resumes tickets of one mirror tree.
pub struct ScopeSyncer<'a, T> {
    layout: &'a MirrorLayout,
    transport: &'a T,
    progress: Option<&'a ProgressCallback>,
}

impl<'a, T: HttpTransport> ScopeSyncer<'a, T> {
    pub fn new(layout: &'a MirrorLayout, transport: &'a T) -> Self {
        Self {
            layout,
            transport,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<&'a ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Ticket file of a scope on one platform.
    pub fn ticket_file(&self, platform: Platform, scope: &TicketScope) -> MirrorResult<TicketFile> {
        let path = match scope {
            TicketScope::Update { .. } => self.layout.update_ticket(platform),
            TicketScope::Batch { package_type, .. } => self
                .layout
                .batch_ticket(platform, package_type_of(*package_type)?),
        };
        Ok(TicketFile::new(path))
    }

    /// Record `links` as pending before anything is downloaded.
    pub fn prepare(
        &self,
        platform: Platform,
        scope: TicketScope,
        links: Vec<DownloadLink>,
        expires_at: Option<i64>,
    ) -> MirrorResult<Ticket> {
        let file = self.ticket_file(platform, &scope)?;
        let count = links.len();
        let ticket = file.prepare(scope.clone(), links, expires_at)?;
        emit(
            self.progress,
            SyncEvent::Prepared {
                platform,
                scope,
                links: count,
            },
        );
        Ok(ticket)
    }

    /// Resume the pending update ticket of a platform.
    pub fn resume_update(&self, platform: Platform, now: i64) -> MirrorResult<ResumeOutcome> {
        self.resume_at(platform, &TicketFile::new(self.layout.update_ticket(platform)), now)
    }

    /// Resume the pending batch ticket of one package type.
    pub fn resume_batch(
        &self,
        platform: Platform,
        package_type: PackageType,
        now: i64,
    ) -> MirrorResult<ResumeOutcome> {
        let file = TicketFile::new(self.layout.batch_ticket(platform, package_type));
        self.resume_at(platform, &file, now)
    }

    fn resume_at(
        &self,
        platform: Platform,
        file: &TicketFile,
        now: i64,
    ) -> MirrorResult<ResumeOutcome> {
        let ticket = match file.load(now)? {
            Some(ticket) => ticket,
            None => return Ok(ResumeOutcome::NoTicket),
        };

        emit(
            self.progress,
            SyncEvent::ResumingScope {
                platform,
                scope: ticket.scope.clone(),
            },
        );

        let target = canonical_version(ticket.scope.version())?;
        let mut scopes_synced = 0;
        let mut files_fetched = 0;
        let groups = ticket.groups()?;
        for group in &groups {
            let dir = self.scope_dir(platform, &ticket.scope, &target, &group.sub_scope)?;
            let manifest_path = MirrorLayout::manifest_in(&dir);
            if ScopeManifest::exists(&manifest_path) {
                emit(self.progress, SyncEvent::SkippedScope { dest: dir });
                continue;
            }
            files_fetched += self.sync_scope(&dir, &group.links)?;
            scopes_synced += 1;
        }

        match &ticket.scope {
            TicketScope::Update { .. } => {
                VersionIndex::append_to(&self.layout.update_index(platform), &target)?;
            }
            TicketScope::Batch { package_type, .. } => {
                let list_path =
                    self.layout
                        .package_id_list(platform, &target, package_type_of(*package_type)?);
                let new_ids = groups.iter().filter_map(|g| match g.sub_scope {
                    SubScope::Package(id) => Some(id),
                    SubScope::Version(_) => None,
                });
                PackageIdList::load(&list_path)?
                    .merged(new_ids)
                    .save(&list_path)?;
            }
        }

        file.remove()?;
        emit(
            self.progress,
            SyncEvent::ScopeComplete {
                platform,
                scope: ticket.scope.clone(),
            },
        );

        Ok(ResumeOutcome::Completed {
            scopes_synced,
            files_fetched,
        })
    }

    /// Download the archives of one sub-scope and write its manifest.
    ///
    /// Returns the number of archives fetched from the network.
    fn sync_scope(&self, dir: &Path, links: &[&DownloadLink]) -> MirrorResult<usize> {
        ensure_dir(dir)?;

        let total = links.len();
        let mut fetched = 0;
        let mut manifest = ScopeManifest::new();
        for (i, link) in links.iter().enumerate() {
            let index = i + 1;
            let dest = MirrorLayout::archive_in(dir, index);

            if dest.is_file() {
                emit(self.progress, SyncEvent::SkippedFile { dest });
            } else {
                emit(
                    self.progress,
                    SyncEvent::Downloading {
                        index,
                        total,
                        dest: dest.clone(),
                    },
                );
                let data = self.transport.fetch(&link.url)?;
                checksum::verify(&link.url, &data, &link.checksums)?;
                write_atomic(&dest, &data)?;
                fetched += 1;
            }
            manifest.push(archive_name(index), link.size);
        }

        manifest.save(&MirrorLayout::manifest_in(dir))?;
        Ok(fetched)
    }

    /// Directory of one sub-scope. `target` is the canonical scope version.
    fn scope_dir(
        &self,
        platform: Platform,
        scope: &TicketScope,
        target: &str,
        sub_scope: &SubScope,
    ) -> MirrorResult<PathBuf> {
        match (scope, sub_scope) {
            (TicketScope::Update { .. }, SubScope::Version(version)) => Ok(self
                .layout
                .update_version_dir(platform, &canonical_version(version)?)),
            (TicketScope::Batch { package_type, .. }, SubScope::Package(id)) => Ok(self
                .layout
                .package_id_dir(platform, target, package_type_of(*package_type)?, *id)),
            _ => Err(MirrorError::Decode {
                endpoint: "ticket".to_string(),
                reason: "link does not match ticket scope".to_string(),
            }),
        }
    }
}

/// Version names become directory names, so only `MAJ.MIN` in its
/// canonical spelling is used (`059.4` is stored as `59.4`).
fn canonical_version(version: &str) -> MirrorResult<String> {
    Ok(version.parse::<GameVersion>()?.to_string())
}

fn package_type_of(id: u8) -> MirrorResult<PackageType> {
    PackageType::from_id(id).ok_or_else(|| MirrorError::Decode {
        endpoint: "ticket".to_string(),
        reason: format!("unknown package type {}", id),
    })
}
