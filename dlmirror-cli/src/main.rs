//! dlmirror CLI - Command-line interface
//!
//! Mirrors a DLAPI server into a local directory and inspects the result.

mod commands;
mod error;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{extract_db, index, mirror, status, upgrade};

#[derive(Parser)]
#[command(name = "dlmirror")]
#[command(version, about = "Local mirror of a DLAPI game content server", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download new update archives and package batches
    Mirror(mirror::MirrorArgs),

    /// Rebuild the micro download archive index of a version
    Index(index::IndexArgs),

    /// Show mirrored versions and pending downloads
    Status(status::StatusArgs),

    /// Extract and decrypt a database file from the mirrored archives
    ExtractDb(extract_db::ExtractDbArgs),

    /// Add hashed manifests, extracted micro entries and decrypted databases
    Upgrade(upgrade::UpgradeArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Mirror(args) => mirror::run(args),
        Commands::Index(args) => index::run(args),
        Commands::Status(args) => status::run(args),
        Commands::ExtractDb(args) => extract_db::run(args),
        Commands::Upgrade(args) => upgrade::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "dlmirror=debug"
    } else {
        "dlmirror=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlmirror::{GameVersion, Platform};

    #[test]
    fn test_parse_mirror_defaults() {
        let cli = Cli::try_parse_from(["dlmirror", "mirror", "/srv/m", "dl.example.com"]).unwrap();
        match cli.command {
            Commands::Mirror(args) => {
                assert_eq!(args.destination, std::path::PathBuf::from("/srv/m"));
                assert_eq!(args.mirror_url, "dl.example.com");
                assert_eq!(args.base_version, GameVersion::new(59, 0));
                assert!(!args.no_ios && !args.no_android);
                assert!(!args.strict_versions);
                assert_eq!(args.timeout, 30);
            }
            _ => panic!("Expected mirror command"),
        }
    }

    #[test]
    fn test_parse_mirror_options() {
        let cli = Cli::try_parse_from([
            "dlmirror",
            "-v",
            "mirror",
            "/srv/m",
            "https://dl.example.com/",
            "--no-ios",
            "--shared-key",
            "k",
            "--base-version",
            "60.2",
            "--timeout",
            "5",
            "--strict-versions",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Mirror(args) => {
                assert!(args.no_ios);
                assert_eq!(args.shared_key.as_deref(), Some("k"));
                assert_eq!(args.base_version, GameVersion::new(60, 2));
                assert!(args.strict_versions);
                assert_eq!(args.timeout, 5);
            }
            _ => panic!("Expected mirror command"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_base_version() {
        let result = Cli::try_parse_from([
            "dlmirror",
            "mirror",
            "/srv/m",
            "u",
            "--base-version",
            "59",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_extract_db() {
        let cli = Cli::try_parse_from([
            "dlmirror",
            "extract-db",
            "/srv/m",
            "59.4",
            "unit",
            "--output",
            "unit.db",
            "--platform",
            "android",
        ])
        .unwrap();
        match cli.command {
            Commands::ExtractDb(args) => {
                assert_eq!(args.version, GameVersion::new(59, 4));
                assert_eq!(args.name, "unit");
                assert_eq!(args.platform, Platform::Android);
            }
            _ => panic!("Expected extract-db command"),
        }
    }

    #[test]
    fn test_parse_upgrade() {
        let cli = Cli::try_parse_from(["dlmirror", "upgrade", "/srv/m", "--force"]).unwrap();
        match cli.command {
            Commands::Upgrade(args) => {
                assert_eq!(args.destination, std::path::PathBuf::from("/srv/m"));
                assert!(args.force);
                assert!(!args.strict_versions);
            }
            _ => panic!("Expected upgrade command"),
        }
    }
}
