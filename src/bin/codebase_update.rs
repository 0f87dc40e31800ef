//! Codebase Update Binary
//!
//! Folds the CDC source feeds into the registry documents and writes back
//! every registry that changed.
//!
//! ## Configuration
//!
//! Environment variables (overridden by the matching flags):
//! - `CODEBASE_DIR`: codebase root (default: ../codebase)
//! - `CODEBASE_AS_OF`: processing date, yyyyMMdd or yyyy-MM-dd (default: today)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for terminals (default: pretty)
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin codebase-update -- --codebase-dir ../codebase --dry-run
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use codebase_reconcile::config::parse_date_setting;
use codebase_reconcile::{codebase_fingerprint, Codebase, SourceFeeds, UpdateConfig, UpdateRun, XmlFileStore};

#[derive(Parser, Debug)]
#[command(name = "codebase-update")]
#[command(about = "Reconcile vaccine code registries against CDC source feeds")]
struct Args {
    /// Codebase root containing base/sets and cdc-source
    #[arg(long, env = "CODEBASE_DIR")]
    codebase_dir: Option<PathBuf>,
    /// Processing date (yyyyMMdd or yyyy-MM-dd)
    #[arg(long, env = "CODEBASE_AS_OF")]
    as_of: Option<String>,
    /// Run the whole pipeline but write nothing
    #[arg(long)]
    dry_run: bool,
    /// Print the run report as JSON on stdout
    #[arg(long)]
    report_json: bool,
}

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

fn resolve_config(args: &Args) -> Result<UpdateConfig, Box<dyn std::error::Error>> {
    let mut config = UpdateConfig::from_env()?;
    if let Some(dir) = &args.codebase_dir {
        config.codebase_dir = dir.clone();
    }
    if let Some(as_of) = &args.as_of {
        config.as_of = parse_date_setting("--as-of", as_of)?;
    }
    config.dry_run = args.dry_run;
    Ok(config)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    info!(
        codebase_dir = %config.codebase_dir.display(),
        as_of = %config.as_of,
        dry_run = config.dry_run,
        "starting codebase update"
    );

    let paths = config.source_paths()?;
    let feeds = SourceFeeds::read(&paths)?;
    let mut store = XmlFileStore::new(config.sets_dir());
    let mut codebase = Codebase::load(&store)?;
    info!(codes = codebase.total_codes(), "codebase loaded");

    let report = UpdateRun::new(config.as_of).execute(&mut codebase, &feeds)?;

    if config.dry_run {
        info!(would_save = report.changed.len(), "dry run, nothing written");
    } else {
        let saved = codebase.persist(&mut store)?;
        info!(saved = saved.len(), "registries written");
    }

    let cross = report.cross_links.totals();
    let fingerprint = codebase_fingerprint(&codebase)?;
    info!(
        examined = cross.examined,
        made = cross.made,
        removed = cross.removed,
        fingerprint = %fingerprint,
        "codebase update complete"
    );

    if args.report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "codebase update failed");
            ExitCode::FAILURE
        }
    }
}
