mod file_config;

pub use file_config::{
    FileConfig, LibraryRootFileConfig, ProcessingConfig, ReviewApiConfig, StagingCronConfig,
};

use crate::library::{LibraryConfigError, LibraryRoot, LibraryRootKind, LibraryRoots};
use crate::server::RequestsLoggingLevel;
use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid library root kind {0:?}, expected inbound, staging or production")]
    InvalidLibraryRootKind(String),
    #[error(transparent)]
    LibraryRoots(#[from] LibraryConfigError),
    #[error("no staging_cron.schedule configured (pass --schedule or set it in the config file)")]
    MissingSchedule,
}

/// Command-line arguments. Everything is optional: a bare invocation reads
/// entirely from the config file and built-in defaults.
#[derive(Debug, Parser, Clone, Default)]
pub struct CliConfig {
    /// Path to a TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub db_dir: Option<PathBuf>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub metrics_port: Option<u16>,

    #[arg(long, value_enum)]
    pub logging_level: Option<RequestsLoggingLevel>,

    #[arg(long)]
    pub dry_run: bool,

    #[arg(long)]
    pub schedule: Option<String>,
}

/// Fully resolved configuration the rest of the crate runs on. Nothing
/// downstream of this point reads `FileConfig` or `CliConfig` directly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,

    pub libraries: LibraryRoots,

    pub staging_enabled: bool,
    pub staging_dry_run: bool,
    pub staging_schedule: String,
    pub staging_workers: usize,
    pub staging_rate_limit_per_sec: usize,
    pub scan_db_dir: PathBuf,

    pub scan_workers: usize,
    pub scan_buffer_size: usize,

    pub review_db_path: PathBuf,
    pub catalog_db_path: PathBuf,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// CLI values override file values where both are present.
    pub fn resolve(cli: &CliConfig, file: FileConfig) -> Result<Self, ConfigError> {
        let db_dir = cli
            .db_dir
            .clone()
            .or_else(|| file.db_dir.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("./data"));

        let port = cli.port.unwrap_or(3001);
        let metrics_port = cli.metrics_port.or(file.metrics_port).unwrap_or(3002);
        let logging_level = cli.logging_level.unwrap_or_default();

        let library_configs = file.libraries.unwrap_or_default();
        let mut roots = Vec::with_capacity(library_configs.len());
        for r in library_configs {
            let kind = match r.kind.as_str() {
                "inbound" => LibraryRootKind::Inbound,
                "staging" => LibraryRootKind::Staging,
                "production" => LibraryRootKind::Production,
                other => return Err(ConfigError::InvalidLibraryRootKind(other.to_string())),
            };
            roots.push(LibraryRoot {
                name: r.name,
                kind,
                path: PathBuf::from(r.path),
                active: r.active,
            });
        }
        let libraries = LibraryRoots::resolve(&roots)?;

        let staging_cron = file.staging_cron.unwrap_or_default();
        let staging_enabled = staging_cron.enabled.unwrap_or(true);
        let staging_dry_run = cli.dry_run || staging_cron.dry_run.unwrap_or(false);
        let staging_schedule = cli
            .schedule
            .clone()
            .or(staging_cron.schedule)
            .ok_or(ConfigError::MissingSchedule)?;
        let staging_workers = staging_cron.workers.unwrap_or(4);
        let staging_rate_limit_per_sec = staging_cron.rate_limit_per_sec.unwrap_or(20);
        let scan_db_dir = staging_cron
            .scan_db_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| db_dir.join("scans"));

        let processing = file.processing.unwrap_or_default();
        let scan_workers = processing.scan_workers.unwrap_or(4);
        let scan_buffer_size = processing.scan_buffer_size.unwrap_or(256);

        let review_api = file.review_api.unwrap_or_default();
        let review_db_path = review_api
            .review_db_path
            .map(PathBuf::from)
            .unwrap_or_else(|| db_dir.join("review.sqlite"));
        let catalog_db_path = review_api
            .catalog_db_path
            .map(PathBuf::from)
            .unwrap_or_else(|| db_dir.join("catalog.sqlite"));

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            libraries,
            staging_enabled,
            staging_dry_run,
            staging_schedule,
            staging_workers,
            staging_rate_limit_per_sec,
            scan_db_dir,
            scan_workers,
            scan_buffer_size,
            review_db_path,
            catalog_db_path,
        })
    }

    pub fn server_config(&self) -> crate::server::ServerConfig {
        crate::server::ServerConfig {
            port: self.port,
            metrics_port: self.metrics_port,
            requests_logging_level: self.logging_level,
            db_dir: self.db_dir.clone(),
        }
    }
}
