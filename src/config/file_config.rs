use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Everything that can come from the TOML config file. Every field is
/// optional so a deployment only needs to override what it cares about;
/// [`super::AppConfig::resolve`] fills the rest in from CLI args and
/// built-in defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub db_dir: Option<String>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,

    pub libraries: Option<Vec<LibraryRootFileConfig>>,
    pub staging_cron: Option<StagingCronConfig>,
    pub processing: Option<ProcessingConfig>,
    pub review_api: Option<ReviewApiConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LibraryRootFileConfig {
    pub name: String,
    /// One of "inbound", "staging", "production".
    pub kind: String,
    pub path: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StagingCronConfig {
    /// Whether the supervisor runs the staging cycle at all. Defaults to true.
    pub enabled: Option<bool>,
    /// If true, the staging processor plans moves but does not touch the
    /// filesystem.
    pub dry_run: Option<bool>,
    /// Standard 5-field cron expression, evaluated in UTC.
    pub schedule: Option<String>,
    /// Concurrent staging workers per cycle.
    pub workers: Option<usize>,
    /// Maximum file operations per second during a cycle.
    pub rate_limit_per_sec: Option<usize>,
    /// Directory holding per-scan scratch databases.
    pub scan_db_dir: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Concurrent tag-reading workers per scan.
    pub scan_workers: Option<usize>,
    /// Bounded channel capacity between scan workers and the collector.
    pub scan_buffer_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ReviewApiConfig {
    pub review_db_path: Option<String>,
    pub catalog_db_path: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("failed to parse config file: {:?}", path))
    }
}
