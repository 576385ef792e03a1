//! Mirror command - bring a local mirror up to date.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use dlmirror::{GameVersion, Mirror, MirrorConfig, MirrorLayout};

use super::common;
use crate::error::CliError;

/// Arguments of `dlmirror mirror`.
#[derive(Debug, Args)]
pub struct MirrorArgs {
    /// Where to store the mirrored files
    pub destination: PathBuf,

    /// URL (with path) of a server speaking the DLAPI 1.1 protocol
    pub mirror_url: String,

    /// Don't download iOS files
    #[arg(long)]
    pub no_ios: bool,

    /// Don't download Android files
    #[arg(long)]
    pub no_android: bool,

    /// Shared key to communicate with the mirror server
    #[arg(long, env = "DLAPI_SHARED_KEY", hide_env_values = true)]
    pub shared_key: Option<String>,

    /// Base game version for update downloads
    #[arg(long, default_value = "59.0")]
    pub base_version: GameVersion,

    /// Seconds to wait on a stalled connection before retrying
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Fail on malformed version names instead of skipping them
    #[arg(long)]
    pub strict_versions: bool,
}

/// Run the mirror command.
pub fn run(args: MirrorArgs) -> Result<(), CliError> {
    let config = MirrorConfig::new(&args.destination, &args.mirror_url)
        .with_shared_key(args.shared_key)
        .with_platforms(common::platforms(args.no_ios, args.no_android))
        .with_base_version(args.base_version)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_retry_delay(Duration::from_secs(1))
        .with_version_policy(common::version_policy(args.strict_versions));
    config.validate()?;

    let layout = MirrorLayout::new(&args.destination);
    let Some(_lock) = common::acquire_lock(&layout)? else {
        return Ok(());
    };

    println!("Mirroring {} into {}", config.mirror_url, args.destination.display());
    println!();

    let mirror = Mirror::connect(config)?.with_progress(Box::new(|event| println!("{}", event)));
    let report = mirror.run()?;

    println!();
    println!("Mirror complete");
    println!("  Game version:     {}", report.target_version);
    println!("  Protocol:         {}", report.protocol);
    println!("  Resumed tickets:  {}", report.resumed_tickets);
    println!(
        "  Updates:          {}",
        if report.updates_fetched {
            "fetched"
        } else {
            "already current"
        }
    );
    println!("  New batches:      {}", report.batches_prepared);
    for (platform, entries) in &report.index_entries {
        println!("  {:<8} index:   {} entries", platform.to_string(), entries);
    }
    Ok(())
}
