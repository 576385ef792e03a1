//! Status command - summarize what a mirror contains.

use std::path::PathBuf;

use clap::Args;
use dlmirror::manifest::VersionIndex;
use dlmirror::ticket::TicketFile;
use dlmirror::{Generation, MirrorLayout, PackageType, Platform, ProcessLock, Upgrader};

use super::common;
use crate::error::CliError;

/// Arguments of `dlmirror status`.
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Root of the mirror
    pub destination: PathBuf,

    /// Fail on malformed version names instead of skipping them
    #[arg(long)]
    pub strict_versions: bool,
}

/// Run the status command.
pub fn run(args: StatusArgs) -> Result<(), CliError> {
    let layout = MirrorLayout::new(&args.destination);
    let policy = common::version_policy(args.strict_versions);

    println!("Mirror: {}", args.destination.display());
    let generation = Upgrader::current_generation(&layout)?;
    if generation < Generation::CURRENT {
        println!("Layout generation: {} (run `dlmirror upgrade`)", generation);
    } else {
        println!("Layout generation: {}", generation);
    }
    println!();

    for platform in Platform::ALL {
        let packages = VersionIndex::load(&layout.package_index(platform))?.versions(policy)?;
        let updates = VersionIndex::load(&layout.update_index(platform))?.versions(policy)?;

        println!("{}", platform);
        println!("  Package versions: {}", join_or_none(&packages));
        println!("  Update versions:  {}", join_or_none(&updates));

        let pending = pending_tickets(&layout, platform);
        if pending.is_empty() {
            println!("  Pending tickets:  none");
        } else {
            println!("  Pending tickets:");
            for ticket in pending {
                println!("    {}", layout.relative(&ticket));
            }
        }
        println!();
    }

    match ProcessLock::holder(&layout.lock_file()) {
        Some(holder) => println!("Locked by pid {} since {}", holder.pid, holder.started_at),
        None => println!("Not locked"),
    }

    match layout.latest_synced_version(&Platform::ALL, policy)? {
        Some(version) => println!("Latest synced version: {}", version),
        None => println!("Latest synced version: none"),
    }
    Ok(())
}

fn pending_tickets(layout: &MirrorLayout, platform: Platform) -> Vec<PathBuf> {
    std::iter::once(layout.update_ticket(platform))
        .chain(
            PackageType::ALL
                .into_iter()
                .map(|ty| layout.batch_ticket(platform, ty)),
        )
        .filter(|path| TicketFile::new(path.clone()).exists())
        .collect()
}

fn join_or_none<T: ToString>(items: &[T]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
