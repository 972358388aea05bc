//! `scan-inbound`: runs the Scanner and Grouper against an inbound
//! directory and leaves the results in a scratch database for later
//! inspection or a separate `process-scan` run.

use clap::Parser;
use melodee_staging::scanner::Scanner;
use melodee_staging::scratch_store::SqliteScratchStore;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'p', long = "path")]
    path: PathBuf,

    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    #[arg(short = 'w', long = "workers", default_value_t = 4)]
    workers: usize,

    #[arg(long = "buffer-size", default_value_t = 256)]
    buffer_size: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()
        .ok();

    let args = Args::parse();

    if !args.path.is_dir() {
        error!(path = ?args.path, "inbound path is not a directory");
        return ExitCode::from(1);
    }

    let output_dir = args.output.unwrap_or_else(|| std::env::temp_dir());
    if let Err(e) = std::fs::create_dir_all(&output_dir) {
        error!(error = %e, "failed to create output directory");
        return ExitCode::from(2);
    }

    let scan_id = Uuid::new_v4().to_string();
    let scratch_path = output_dir.join(format!("{scan_id}.sqlite"));

    let scratch = match SqliteScratchStore::open(&scratch_path, &scan_id) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open scratch store");
            return ExitCode::from(2);
        }
    };

    let scanner = Scanner::new(scratch.clone(), args.path.clone(), args.workers, args.buffer_size);
    let summary = match scanner.run().await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "scan failed");
            return ExitCode::from(2);
        }
    };

    let group_count = match scratch.compute_grouping() {
        Ok(n) => n,
        Err(e) => {
            error!(error = %e, "grouping failed");
            return ExitCode::from(2);
        }
    };

    info!(
        scan_id,
        scratch_db = %scratch_path.display(),
        files_discovered = summary.files_discovered,
        files_valid = summary.files_valid,
        files_invalid = summary.files_invalid,
        groups_found = group_count,
        "scan complete"
    );

    if summary.files_invalid > 0 {
        return ExitCode::from(3);
    }
    ExitCode::SUCCESS
}
