use anyhow::{Context, Result};
use clap::Parser;
use melodee_staging::background_jobs::{BackgroundJob, JobContext, JobScheduler, JobSchedule, StagingCycleJob};
use melodee_staging::catalog_store::SqliteCatalogStore;
use melodee_staging::path_planner::ArtistDirectoryCodes;
use melodee_staging::promotion::PromotionEngine;
use melodee_staging::review_store::SqliteReviewStore;
use melodee_staging::server::{self, ServerState};
use melodee_staging::staging_processor::FileOpThrottler;
use melodee_staging::{AppConfig, CliConfig, FileConfig};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .ok();

    let cli = CliConfig::parse();
    let file_config = match &cli.config {
        Some(path) => {
            info!(?path, "loading configuration file");
            FileConfig::load(path)?
        }
        None => FileConfig::default(),
    };
    let config = AppConfig::resolve(&cli, file_config).context("resolving configuration")?;

    std::fs::create_dir_all(&config.db_dir).context("creating db_dir")?;
    std::fs::create_dir_all(&config.scan_db_dir).context("creating scan_db_dir")?;

    server::metrics::register_all();

    let catalog_store = Arc::new(
        SqliteCatalogStore::open(&config.catalog_db_path).context("opening catalog store")?,
    );
    let review_store = SqliteReviewStore::open(&config.review_db_path).context("opening review store")?;

    let codes_conn = Connection::open(config.db_dir.join("directory_codes.sqlite"))
        .context("opening directory codes db")?;
    let directory_codes =
        ArtistDirectoryCodes::new(Arc::new(Mutex::new(codes_conn))).context("initializing directory codes")?;

    let throttler = Arc::new(if config.staging_rate_limit_per_sec == 0 {
        FileOpThrottler::unlimited()
    } else {
        FileOpThrottler::new(config.staging_rate_limit_per_sec)
    });

    let shutdown = CancellationToken::new();

    let promotion_engine = Arc::new(PromotionEngine::new(
        review_store.clone(),
        catalog_store.clone(),
        config.libraries.production.clone(),
    ));

    let server_state = ServerState {
        config: config.server_config(),
        review_store: review_store.clone(),
        catalog_store: catalog_store.clone(),
        promotion_engine,
    };

    let server_shutdown = shutdown.clone();
    let server_task = tokio::spawn(server::run_server(server_state, server_shutdown));

    let scheduler_task: Option<tokio::task::JoinHandle<Result<()>>> = if config.staging_enabled {
        let job_context = JobContext {
            inbound_root: config.libraries.inbound.clone(),
            staging_root: config.libraries.staging.clone(),
            scan_db_dir: config.scan_db_dir.clone(),
            scan_workers: config.scan_workers,
            scan_buffer_size: config.scan_buffer_size,
            processing_workers: config.staging_workers,
            dry_run: config.staging_dry_run,
            review_store: review_store.clone(),
            directory_codes,
            throttler,
        };
        let job: Arc<dyn BackgroundJob> = Arc::new(StagingCycleJob::new(
            JobSchedule::Cron(config.staging_schedule.clone()),
            job_context,
        ));
        info!(schedule = %config.staging_schedule, "staging cycle scheduled");
        let scheduler = JobScheduler::new(job, shutdown.child_token());
        Some(tokio::spawn(async move { Ok(scheduler.run().await?) }))
    } else {
        info!("staging cycle disabled");
        None
    };

    info!(port = config.port, "melodee-staging ready");

    tokio::select! {
        result = server_task => {
            shutdown.cancel();
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
            shutdown.cancel();
        }
    }

    if let Some(task) = scheduler_task {
        let _ = task.await;
    }

    Ok(())
}
