//! `process-scan`: runs the Staging Processor against an existing scratch
//! store, moving its album groups into a staging library root.

use clap::Parser;
use melodee_staging::path_planner::ArtistDirectoryCodes;
use melodee_staging::scratch_store::SqliteScratchStore;
use melodee_staging::staging_processor::{FileOpThrottler, ProcessStatus, StagingProcessor};
use rusqlite::Connection;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 's', long = "scan")]
    scan_db: PathBuf,

    #[arg(long = "staging")]
    staging: PathBuf,

    #[arg(short = 'w', long = "workers", default_value_t = 4)]
    workers: usize,

    #[arg(long = "rate-limit", default_value_t = 0)]
    rate_limit: usize,

    #[arg(long = "dry-run", default_value_t = false)]
    dry_run: bool,
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

    if !args.scan_db.is_file() {
        error!(path = ?args.scan_db, "scan database does not exist");
        return ExitCode::from(1);
    }

    let scan_id = match scan_id_from_path(&args.scan_db) {
        Some(id) => id,
        None => {
            error!(path = ?args.scan_db, "could not derive scan id from scratch db filename");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&args.staging) {
        error!(error = %e, "failed to create staging root");
        return ExitCode::from(2);
    }

    let scratch = match SqliteScratchStore::open(&args.scan_db, &scan_id) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open scratch store");
            return ExitCode::from(2);
        }
    };

    let codes_conn = match Connection::open(args.staging.join(".directory_codes.sqlite")) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to open directory codes db");
            return ExitCode::from(2);
        }
    };
    let codes = match ArtistDirectoryCodes::new(Arc::new(Mutex::new(codes_conn))) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to initialize directory codes");
            return ExitCode::from(2);
        }
    };

    let throttler = Arc::new(if args.rate_limit == 0 {
        FileOpThrottler::unlimited()
    } else {
        FileOpThrottler::new(args.rate_limit)
    });

    let processor = StagingProcessor::new(scratch, codes, args.staging.clone(), throttler, args.dry_run);

    let results = match processor.run(args.workers).await {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "staging run failed");
            return ExitCode::from(2);
        }
    };

    let staged = results.iter().filter(|r| r.status == ProcessStatus::Staged).count();
    let failed = results.iter().filter(|r| r.status == ProcessStatus::Failed).count();
    let skipped = results.iter().filter(|r| r.status == ProcessStatus::Skipped).count();

    info!(scan_id, staged, failed, skipped, "processing complete");

    if failed > 0 {
        ExitCode::from(3)
    } else {
        ExitCode::SUCCESS
    }
}

fn scan_id_from_path(path: &PathBuf) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().to_string())
}
