//! Interactive catalog shell.
//!
//! # Responsibility
//! - Resolve catalog, config and logging locations from arguments.
//! - Open the catalog and hand stdin/stdout to the shell loop.

mod shell;

use clap::Parser;
use contentdex_core::db::open_db_with_tables;
use contentdex_core::{
    default_catalog_path, default_log_dir, default_log_level, init_logging, CatalogConfig,
    DigestAlgorithm, IngestService, SqliteCatalogStore,
};
use log::info;
use shell::Shell;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "contentdex", version, about = "Content-addressed file catalog")]
struct Args {
    /// Catalog database file [default: ~/.contentdex.sqlite]
    catalog: Option<PathBuf>,

    /// TOML file with digest and table name settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Digest for new fingerprints: md5, sha256 or blake3
    #[arg(long)]
    digest: Option<DigestAlgorithm>,

    /// Directory for rolling log files [default: ~/.contentdex/logs]
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("contentdex: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), String> {
    let mut config = match &args.config {
        Some(path) => CatalogConfig::load(path).map_err(|err| err.to_string())?,
        None => CatalogConfig::default(),
    };
    if let Some(digest) = args.digest {
        config.digest_algorithm = digest;
    }

    let log_dir = args.log_dir.unwrap_or_else(default_log_dir);
    let log_level = args.log_level.as_deref().unwrap_or(default_log_level());
    if let Err(err) = init_logging(log_level, &log_dir) {
        eprintln!("contentdex: logging disabled: {err}");
    }

    let catalog = args.catalog.unwrap_or_else(default_catalog_path);
    let conn = open_db_with_tables(&catalog, &config.table_names).map_err(|err| err.to_string())?;
    let store = SqliteCatalogStore::from_config(&conn, &config).map_err(|err| err.to_string())?;
    let service = IngestService::from_config(store, &config);

    info!(
        "event=shell_start module=cli status=ok catalog={} digest={}",
        catalog.display(),
        config.digest_algorithm
    );
    println!("Using catalog {}", catalog.display());
    println!("Type 'h' for help.");

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    Shell::new(service, "contentdex")
        .run(stdin.lock(), stdout.lock())
        .map_err(|err| err.to_string())?;

    info!("event=shell_finish module=cli status=ok");
    Ok(())
}
