//! Index command - rebuild `microdl_map.json` for one version.

use std::path::PathBuf;

use clap::Args;
use dlmirror::{build_archive_index, GameVersion, MirrorLayout};

use super::common;
use crate::error::CliError;

/// Arguments of `dlmirror index`.
#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Root of the mirror
    pub destination: PathBuf,

    /// Game version to index
    pub version: GameVersion,

    /// Skip iOS
    #[arg(long)]
    pub no_ios: bool,

    /// Skip Android
    #[arg(long)]
    pub no_android: bool,
}

/// Run the index command.
pub fn run(args: IndexArgs) -> Result<(), CliError> {
    let platforms = common::platforms(args.no_ios, args.no_android);
    if platforms.is_empty() {
        return Err(CliError::Config("nothing to index".to_string()));
    }

    let layout = MirrorLayout::new(&args.destination);
    let Some(_lock) = common::acquire_lock(&layout)? else {
        return Ok(());
    };

    let version = args.version.to_string();
    for platform in platforms {
        let index = build_archive_index(&layout, platform, &version)?;
        println!(
            "{} {}: {} entries -> {}",
            platform,
            version,
            index.len(),
            layout.archive_index(platform, &version).display()
        );
    }
    Ok(())
}
