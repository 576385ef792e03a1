//! Full mirror run.
//!
//! ```text
//! resume pending tickets
//!   └► publicinfo + protocol gate
//!        └► update links (when behind) ─► tickets ─► resume
//!             └► batch links per type (minus known ids) ─► tickets ─► resume
//!                  └► archive index ─► package/info.json ─► release_info.json
//! ```

use std::collections::BTreeMap;

use super::progress::{emit, ProgressCallback, SyncEvent};
use super::resume::{ResumeOutcome, ScopeSyncer};
use crate::api::{DlapiClient, PublicInfo};
use crate::archive_index::build_archive_index;
use crate::config::MirrorConfig;
use crate::error::MirrorResult;
use crate::layout::{MirrorLayout, PackageType, Platform};
use crate::manifest::{PackageIdList, VersionIndex};
use crate::storage::{ensure_dir, write_json_atomic};
use crate::ticket::TicketScope;
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::version::{GameVersion, ProtocolVersion};

/// Summary of a completed mirror run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    pub target_version: GameVersion,
    pub protocol: ProtocolVersion,
    /// Tickets left by an earlier run that were completed first.
    pub resumed_tickets: usize,
    /// Whether update links were requested this run.
    pub updates_fetched: bool,
    /// Batch tickets written for new packages.
    pub batches_prepared: usize,
    /// Archive index size per platform.
    pub index_entries: BTreeMap<Platform, usize>,
}

/// Current time in epoch seconds.
pub fn current_time() -> i64 {
    chrono::Utc::now().timestamp()
}

/// One mirror tree bound to one DLAPI server.
pub struct Mirror<T> {
    config: MirrorConfig,
    layout: MirrorLayout,
    client: DlapiClient<T>,
    progress: Option<ProgressCallback>,
    clock: fn() -> i64,
}

impl Mirror<ReqwestTransport> {
    /// Build a mirror talking HTTP with the configured timeout and retries.
    pub fn connect(config: MirrorConfig) -> MirrorResult<Self> {
        config.validate()?;
        let transport = ReqwestTransport::with_settings(config.timeout, config.retry_policy())?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: HttpTransport> Mirror<T> {
    pub fn with_transport(config: MirrorConfig, transport: T) -> Self {
        let layout = MirrorLayout::new(config.root.clone());
        let client = DlapiClient::new(transport, config.mirror_url.clone(), config.shared_key.clone());
        Self {
            config,
            layout,
            client,
            progress: None,
            clock: current_time,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Replace the clock used for ticket expiry.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn layout(&self) -> &MirrorLayout {
        &self.layout
    }

    pub fn client(&self) -> &DlapiClient<T> {
        &self.client
    }

    fn syncer(&self) -> ScopeSyncer<'_, T> {
        ScopeSyncer::new(&self.layout, self.client.transport()).with_progress(self.progress.as_ref())
    }

    /// Finish every ticket left on disk, updates first.
    ///
    /// Returns the number of tickets completed.
    pub fn resume_pending(&self) -> MirrorResult<usize> {
        let syncer = self.syncer();
        let now = (self.clock)();
        let mut completed = 0;
        for &platform in &self.config.platforms {
            if let ResumeOutcome::Completed { .. } = syncer.resume_update(platform, now)? {
                completed += 1;
            }
        }
        for &platform in &self.config.platforms {
            for package_type in PackageType::ALL {
                if let ResumeOutcome::Completed { .. } =
                    syncer.resume_batch(platform, package_type, now)?
                {
                    completed += 1;
                }
            }
        }
        Ok(completed)
    }

    /// Query `publicinfo` and refuse incompatible servers.
    pub fn server_info(&self) -> MirrorResult<PublicInfo> {
        let info = self.client.public_info()?;
        emit(
            self.progress.as_ref(),
            SyncEvent::ServerInfo {
                url: self.client.base_url().to_string(),
                protocol: info.dlapi_version,
                game_version: info.game_version.clone(),
                link_lifetime: info.serve_time_limit,
            },
        );
        if let Some(application) = &info.application {
            for (key, value) in application {
                tracing::info!(key = key.as_str(), %value, "Application data");
            }
        }
        info.ensure_protocol(self.config.required_protocol)?;
        Ok(info)
    }

    /// Bring the mirror tree up to date with the server.
    pub fn run(&self) -> MirrorResult<MirrorReport> {
        self.config.validate()?;
        let platforms = &self.config.platforms;
        for &platform in platforms {
            ensure_dir(&self.layout.package_dir(platform))?;
        }

        let resumed_tickets = self.resume_pending()?;

        let info = self.server_info()?;
        let target = info.target_version()?;
        let target_str = target.to_string();
        let syncer = self.syncer();

        let local = self
            .layout
            .latest_synced_version(platforms, self.config.version_policy)?;
        let from = local.map_or(self.config.base_version, |v| v.max(self.config.base_version));
        let updates_fetched = target > from;
        if updates_fetched {
            tracing::info!(%from, %target, "Fetching update links");
            let expires_at = info.link_expiry((self.clock)());
            for &platform in platforms {
                let links = self.client.update(from, platform)?;
                syncer.prepare(
                    platform,
                    TicketScope::Update {
                        version: target_str.clone(),
                    },
                    links,
                    expires_at,
                )?;
            }
            let now = (self.clock)();
            for &platform in platforms {
                syncer.resume_update(platform, now)?;
            }
        } else {
            tracing::info!(%target, "Updates are current");
        }

        let mut batches_prepared = 0;
        for &platform in platforms {
            for package_type in PackageType::ALL {
                let known = PackageIdList::load(&self.layout.package_id_list(
                    platform,
                    &target_str,
                    package_type,
                ))?;
                let links = self.client.batch(package_type, platform, known.ids())?;
                if links.is_empty() {
                    tracing::debug!(%platform, %package_type, "No new packages");
                    continue;
                }
                syncer.prepare(
                    platform,
                    TicketScope::Batch {
                        version: target_str.clone(),
                        package_type: package_type.id(),
                    },
                    links,
                    info.link_expiry((self.clock)()),
                )?;
                batches_prepared += 1;
            }
        }
        let now = (self.clock)();
        for &platform in platforms {
            for package_type in PackageType::ALL {
                syncer.resume_batch(platform, package_type, now)?;
            }
        }

        let mut index_entries = BTreeMap::new();
        for &platform in platforms {
            emit(
                self.progress.as_ref(),
                SyncEvent::BuildingIndex {
                    platform,
                    version: target_str.clone(),
                },
            );
            let index = build_archive_index(&self.layout, platform, &target_str)?;
            index_entries.insert(platform, index.len());
        }

        for &platform in platforms {
            VersionIndex::append_to(&self.layout.package_index(platform), &target_str)?;
        }

        emit(self.progress.as_ref(), SyncEvent::FetchingReleaseInfo);
        let release_info = self.client.release_info()?;
        write_json_atomic(&self.layout.release_info(), &release_info)?;

        Ok(MirrorReport {
            target_version: target,
            protocol: info.dlapi_version,
            resumed_tickets,
            updates_fetched,
            batches_prepared,
            index_entries,
        })
    }
}
