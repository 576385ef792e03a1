//! Upgrade command - bring a mirror tree to the current layout generation.

use std::path::PathBuf;

use clap::Args;
use dlmirror::crypt::{DecryptProvider, ProviderRegistry};
use dlmirror::{Generation, MirrorLayout, Upgrader};

use super::common;
use crate::error::CliError;

/// Arguments of `dlmirror upgrade`.
#[derive(Debug, Args)]
pub struct UpgradeArgs {
    /// Root of the mirror
    pub destination: PathBuf,

    /// Regenerate even when the tree is already current
    #[arg(long)]
    pub force: bool,

    /// Fail on malformed version names instead of skipping them
    #[arg(long)]
    pub strict_versions: bool,
}

/// Run the upgrade command.
pub fn run(args: UpgradeArgs) -> Result<(), CliError> {
    if !args.destination.is_dir() {
        return Err(CliError::Config(format!(
            "{} is not a directory",
            args.destination.display()
        )));
    }

    let layout = MirrorLayout::new(&args.destination);
    let Some(_lock) = common::acquire_lock(&layout)? else {
        return Ok(());
    };

    let registry = ProviderRegistry::with_defaults();
    let decrypter = registry.select().ok();
    if let Some(provider) = decrypter {
        tracing::debug!(provider = provider.name(), "Using decrypter");
    }

    let report = Upgrader::new(&layout, decrypter)
        .with_version_policy(common::version_policy(args.strict_versions))
        .with_force(args.force)
        .run()?;

    if !report.upgraded {
        println!("Up-to-date (generation {})", report.from);
        return Ok(());
    }

    println!("Upgraded {} to generation {}", args.destination.display(), Generation::CURRENT);
    println!("  Previous generation: {}", report.from);
    for platform in &report.platforms {
        println!("  Platform:            {}", platform);
    }
    println!("  Hashed scopes:       {}", report.hashed_scopes);
    println!("  Extracted entries:   {}", report.extracted_entries);
    println!("  Databases:           {}", report.databases);
    Ok(())
}
