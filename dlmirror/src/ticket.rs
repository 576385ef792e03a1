//! Durable records of pending fetch batches.
//!
//! A ticket is written before any file of its scope is downloaded and
//! removed only after every sub-scope has a manifest. The remote links are
//! presigned and time limited, so an expired ticket cannot be resumed.
//!
//! # Format
//!
//! ```json
//! {
//!   "format": 1,
//!   "scope": {"kind": "batch", "version": "59.4", "package_type": 4},
//!   "expires_at": 1700000000,
//!   "links": [{"url": "...", "size": 1, "checksums": {...}, "packageId": 12}]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::DownloadLink;
use crate::error::{MirrorError, MirrorResult};
use crate::storage::{read_json, remove_file_if_exists, write_json_atomic};

/// Current ticket schema version.
pub const TICKET_FORMAT: u32 = 1;

/// What a ticket fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TicketScope {
    /// Update archives leading up to `version`.
    Update { version: String },
    /// Package batches of one type for `version`.
    Batch { version: String, package_type: u8 },
}

impl TicketScope {
    /// Target game version of the scope.
    pub fn version(&self) -> &str {
        match self {
            Self::Update { version } | Self::Batch { version, .. } => version,
        }
    }
}

/// Sub-scope a link belongs to: an update version or a package id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubScope {
    Version(String),
    Package(u32),
}

/// Links of one sub-scope in server order.
#[derive(Debug, Clone)]
pub struct LinkGroup<'a> {
    pub sub_scope: SubScope,
    pub links: Vec<&'a DownloadLink>,
}

/// A pending fetch batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub format: u32,
    pub scope: TicketScope,
    /// Epoch seconds after which the links are invalid; `None` or 0 is never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub links: Vec<DownloadLink>,
}

impl Ticket {
    pub fn new(scope: TicketScope, links: Vec<DownloadLink>, expires_at: Option<i64>) -> Self {
        Self {
            format: TICKET_FORMAT,
            scope,
            expires_at,
            links,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        match self.expires_at {
            None | Some(0) => false,
            Some(at) => now >= at,
        }
    }

    /// Persist the ticket atomically.
    pub fn save(&self, path: &Path) -> MirrorResult<()> {
        write_json_atomic(path, self)
    }

    /// Read a ticket without checking its expiry.
    pub fn read(path: &Path) -> MirrorResult<Self> {
        let value: Value = read_json(path)?;
        let found = value
            .get("format")
            .and_then(Value::as_u64)
            .and_then(|f| u32::try_from(f).ok())
            .unwrap_or(0);
        if found != TICKET_FORMAT {
            return Err(MirrorError::TicketFormat {
                path: path.to_path_buf(),
                found,
            });
        }
        serde_json::from_value(value).map_err(|source| MirrorError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the pending ticket at `path`, if any.
    ///
    /// Fails with [`MirrorError::TicketExpired`] when `now` is past the expiry.
    pub fn load(path: &Path, now: i64) -> MirrorResult<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let ticket = Self::read(path)?;
        if ticket.is_expired(now) {
            return Err(MirrorError::TicketExpired {
                path: path.to_path_buf(),
            });
        }
        Ok(Some(ticket))
    }

    /// Group links by sub-scope, keeping the order groups first appear in.
    pub fn groups(&self) -> MirrorResult<Vec<LinkGroup<'_>>> {
        let mut groups: Vec<LinkGroup<'_>> = Vec::new();
        for link in &self.links {
            let sub_scope = self.sub_scope_of(link)?;
            match groups.iter_mut().find(|g| g.sub_scope == sub_scope) {
                Some(group) => group.links.push(link),
                None => groups.push(LinkGroup {
                    sub_scope,
                    links: vec![link],
                }),
            }
        }
        Ok(groups)
    }

    fn sub_scope_of(&self, link: &DownloadLink) -> MirrorResult<SubScope> {
        match &self.scope {
            TicketScope::Update { version } => Ok(SubScope::Version(
                link.version.clone().unwrap_or_else(|| version.clone()),
            )),
            TicketScope::Batch { .. } => link
                .package_id
                .map(SubScope::Package)
                .ok_or_else(|| MirrorError::Decode {
                    endpoint: "ticket".to_string(),
                    reason: format!("batch link {} has no packageId", link.url),
                }),
        }
    }
}

/// Location and lifecycle of one ticket file.
#[derive(Debug, Clone)]
pub struct TicketFile {
    path: PathBuf,
}

impl TicketFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Record links as a pending scope before downloading anything.
    pub fn prepare(
        &self,
        scope: TicketScope,
        links: Vec<DownloadLink>,
        expires_at: Option<i64>,
    ) -> MirrorResult<Ticket> {
        let ticket = Ticket::new(scope, links, expires_at);
        ticket.save(&self.path)?;
        tracing::debug!(path = %self.path.display(), links = ticket.links.len(), "Ticket prepared");
        Ok(ticket)
    }

    pub fn load(&self, now: i64) -> MirrorResult<Option<Ticket>> {
        Ticket::load(&self.path, now)
    }

    pub fn remove(&self) -> MirrorResult<()> {
        remove_file_if_exists(&self.path)
    }
}
