//! Extract-db command - pull a decrypted database out of the archives.

use std::path::PathBuf;

use clap::Args;
use dlmirror::crypt::{DatabaseExtractor, DecryptProvider, ProviderRegistry};
use dlmirror::{storage, GameVersion, MirrorLayout, Platform};

use super::common;
use crate::error::CliError;

/// Arguments of `dlmirror extract-db`.
#[derive(Debug, Args)]
pub struct ExtractDbArgs {
    /// Root of the mirror
    pub destination: PathBuf,

    /// Game version whose database to extract
    pub version: GameVersion,

    /// Database name without extension (e.g. "unit")
    pub name: String,

    /// Output file (defaults to `<name>.db` in the current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Platform whose archives to search
    #[arg(long, default_value = "ios")]
    pub platform: Platform,

    /// Fail on malformed version names instead of skipping them
    #[arg(long)]
    pub strict_versions: bool,
}

/// Run the extract-db command.
pub fn run(args: ExtractDbArgs) -> Result<(), CliError> {
    let layout = MirrorLayout::new(&args.destination);
    let registry = ProviderRegistry::with_defaults();
    let decrypter = registry.select()?;
    tracing::debug!(provider = decrypter.name(), "Using decrypter");

    let data = DatabaseExtractor::new(&layout, decrypter)
        .with_version_policy(common::version_policy(args.strict_versions))
        .extract(args.platform, args.version, &args.name)?;

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{}.db", args.name)));
    storage::write_atomic(&output, &data)?;

    println!(
        "Wrote {} ({} bytes) from {} {}",
        output.display(),
        data.len(),
        args.platform,
        args.version
    );
    Ok(())
}
