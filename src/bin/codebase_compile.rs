//! Codebase Compile Binary
//!
//! Collates every registry document under `<base>/sets` into
//! `<base>/Compiled.xml`.
//!
//! ```bash
//! cargo run --bin codebase-compile -- ../codebase/base
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use codebase_reconcile::compile_codesets;

#[derive(Parser, Debug)]
#[command(name = "codebase-compile")]
#[command(about = "Collate registry documents into one compiled codebase file")]
struct Args {
    /// Base directory holding the sets directory
    #[arg(default_value = "../codebase/base")]
    base_dir: PathBuf,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().flatten_event(true)).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    match compile_codesets(&args.base_dir) {
        Ok(report) => {
            info!(output = %report.output.display(), fragments = report.fragments.len(), "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "compile failed");
            ExitCode::FAILURE
        }
    }
}
