//! dlmirror - Local mirror of a DLAPI game content server
//!
//! This library keeps a resumable copy of the update archives and package
//! batches a DLAPI server distributes, laid out so a private server can
//! serve them back to game clients.
//!
//! Typical use:
//!
//! ```no_run
//! use dlmirror::{Mirror, MirrorConfig};
//!
//! let config = MirrorConfig::new("/srv/mirror", "dl.example.com/sif");
//! let report = Mirror::connect(config)?.run()?;
//! println!("Mirrored version {}", report.target_version);
//! # Ok::<(), dlmirror::MirrorError>(())
//! ```

pub mod api;
pub mod archive_index;
pub mod config;
pub mod crypt;
pub mod error;
pub mod layout;
pub mod lock;
pub mod manifest;
pub mod storage;
pub mod sync;
pub mod ticket;
pub mod transport;
pub mod upgrade;
pub mod version;

pub use archive_index::{build_archive_index, ArchiveIndex};
pub use config::MirrorConfig;
pub use error::{MirrorError, MirrorResult};
pub use layout::{MirrorLayout, PackageType, Platform};
pub use lock::ProcessLock;
pub use sync::{Mirror, MirrorReport, ProgressCallback, SyncEvent};
pub use upgrade::{UpgradeReport, Upgrader};
pub use version::{GameVersion, Generation, ProtocolVersion, VersionParsePolicy};
