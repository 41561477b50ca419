//! Strata CLI - Archive and cache command line interface
//!
//! This binary files CSV data into schema-driven archives and builds
//! hash-verified caches from them.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use strata_archive::ArchiveOptions;
use strata_build::BuildOptions;
use strata_common::{Config, Schema};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(about = "Schema-driven CSV archives with hash-verified caches")]
#[command(version)]
struct Args {
    /// Overwrite existing files
    #[arg(short, long, global = true)]
    force: bool,

    /// Report every file read, skipped and written
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "STRATA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (overrides the configuration file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// File data into an archive following its schema
    Archive {
        /// Archive root
        destination: PathBuf,
        /// Data files
        #[arg(short, long = "data", required = true, num_args = 1..)]
        data: Vec<PathBuf>,
        /// Metadata files describing the data files
        #[arg(short, long = "metadata", num_args = 1..)]
        metadata: Vec<PathBuf>,
    },
    /// Build a cache from an archive or a single file
    Build {
        /// Archive directory or source file
        source: PathBuf,
        /// Cache file to write
        destination: PathBuf,
        /// Ledger file (defaults to a sibling of the cache)
        #[arg(long)]
        hashfile: Option<PathBuf>,
        /// Ignore any existing cache
        #[arg(long)]
        full: bool,
        /// Do not record digests after building
        #[arg(long)]
        no_post_hash: bool,
    },
    /// Verify a file against its ledger entry
    Check {
        /// File to verify
        target: PathBuf,
        /// Ledger file (defaults to a sibling of the target)
        #[arg(long)]
        hashfile: Option<PathBuf>,
    },
    /// Create an archive with the given schema
    Init {
        /// Archive root
        destination: PathBuf,
        /// Schema columns, outermost directory level first
        #[arg(required = true)]
        headers: Vec<String>,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn init_logging(args: &Args, config: &Config) {
    // CLI takes precedence over the config file
    let level = args.log_level.clone().unwrap_or_else(|| {
        if args.verbose {
            "info".to_string()
        } else {
            config.logging.level.clone()
        }
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(args: Args, config: &Config) -> Result<bool> {
    let Args {
        force,
        verbose,
        command,
        ..
    } = args;

    match command {
        Commands::Archive {
            destination,
            data,
            metadata,
        } => {
            let schema_path = destination.join(&config.archive.schema_file_name);
            let schema = if schema_path.exists() {
                Some(Schema::load(&schema_path)?)
            } else {
                debug!("No schema at {}, archiving flat", schema_path.display());
                None
            };
            let options = ArchiveOptions::from_config(&config.archive, force, verbose);
            strata_archive::archive(&destination, &data, schema.as_ref(), &metadata, &options)
                .with_context(|| format!("failed to archive into {}", destination.display()))
        }
        Commands::Build {
            source,
            destination,
            hashfile,
            full,
            no_post_hash,
        } => {
            let mut options = BuildOptions::from_config(config, force, verbose);
            options.incremental &= !full;
            options.post_hash &= !no_post_hash;

            let built = if source.is_dir() {
                strata_build::build_tree(&source, &destination, hashfile.as_deref(), &options)
            } else {
                strata_build::build(&destination, &[source], hashfile.as_deref(), &options)
            };
            built.with_context(|| format!("failed to build {}", destination.display()))
        }
        Commands::Check { target, hashfile } => {
            let options = BuildOptions::from_config(config, force, verbose).check_options();
            let passed = strata_build::check(&target, hashfile.as_deref(), &options);
            println!(
                "{}: {}",
                target.display(),
                if passed { "OK" } else { "FAILED" }
            );
            Ok(passed)
        }
        Commands::Init {
            destination,
            headers,
        } => {
            let schema = Schema::from_headers(headers);
            let path = destination.join(&config.archive.schema_file_name);
            strata_archive::init(&schema, &path, force, verbose)
                .with_context(|| format!("failed to initialize {}", destination.display()))?;
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    // Parse command line arguments
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    init_logging(&args, &config);
    info!("Strata {}", env!("CARGO_PKG_VERSION"));

    match run(args, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_archive_arguments() {
        let args = Args::try_parse_from([
            "strata", "-f", "archive", "out", "-d", "a.csv", "b.csv", "-m", "a.meta",
        ])
        .unwrap();
        assert!(args.force);
        match args.command {
            Commands::Archive { data, metadata, .. } => {
                assert_eq!(data, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
                assert_eq!(metadata, vec![PathBuf::from("a.meta")]);
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Args::try_parse_from(["strata", "archive", "out"]).is_err());
    }

    #[test]
    fn test_init_archive_build_check() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("archive");
        let data = dir.path().join("iris.csv");
        std::fs::write(&data, "Name,Width\nsetosa,1\nvirginica,2\n").unwrap();
        let cache = dir.path().join("cache.csv");
        let config = Config::default();

        let parse = |argv: &[&str]| Args::try_parse_from(argv).unwrap();
        let root_arg = root.to_str().unwrap();
        let data_arg = data.to_str().unwrap();
        let cache_arg = cache.to_str().unwrap();

        assert!(run(parse(&["strata", "init", root_arg, "Name"]), &config).unwrap());
        assert!(run(parse(&["strata", "archive", root_arg, "-d", data_arg]), &config).unwrap());
        assert!(root.join("setosa").join("iris.csv").exists());

        assert!(run(parse(&["strata", "build", root_arg, cache_arg]), &config).unwrap());
        assert!(run(parse(&["strata", "check", cache_arg]), &config).unwrap());

        // a second build needs --force
        assert!(run(parse(&["strata", "build", root_arg, cache_arg]), &config).is_err());
        assert!(run(parse(&["strata", "-f", "build", root_arg, cache_arg]), &config).unwrap());
    }
}
