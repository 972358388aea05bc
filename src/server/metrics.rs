//! In-process pipeline metrics. No HTTP exporter is wired up — an
//! operator wanting Prometheus scraping fronts this with their own
//! collector; these counters exist for the Review API's `/staging/stats`
//! endpoint and for ad-hoc inspection, not for scraping.

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Opts, Registry};

const PREFIX: &str = "melodee_staging";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref CYCLES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_cycles_total"), "Staging cycles run, by outcome"),
        &["outcome"]
    ).expect("failed to create cycles_total metric");

    pub static ref FILES_SCANNED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_files_scanned_total"),
        "Audio files discovered across all scans"
    ).expect("failed to create files_scanned_total metric");

    pub static ref GROUPS_STAGED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_groups_staged_total"),
        "Album groups successfully staged"
    ).expect("failed to create groups_staged_total metric");

    pub static ref GROUPS_FAILED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_groups_failed_total"),
        "Album groups that failed to stage"
    ).expect("failed to create groups_failed_total metric");

    pub static ref ALBUMS_PROMOTED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_albums_promoted_total"),
        "Albums promoted into the catalog"
    ).expect("failed to create albums_promoted_total metric");
}

/// Registers every metric with [`REGISTRY`]. Called once at startup;
/// registering twice would panic, so callers should only invoke this from
/// `main`.
pub fn register_all() {
    REGISTRY.register(Box::new(CYCLES_TOTAL.clone())).ok();
    REGISTRY.register(Box::new(FILES_SCANNED_TOTAL.clone())).ok();
    REGISTRY.register(Box::new(GROUPS_STAGED_TOTAL.clone())).ok();
    REGISTRY.register(Box::new(GROUPS_FAILED_TOTAL.clone())).ok();
    REGISTRY.register(Box::new(ALBUMS_PROMOTED_TOTAL.clone())).ok();
}

pub fn record_cycle_result(result: &crate::background_jobs::StagingJobResult) {
    CYCLES_TOTAL.with_label_values(&["completed"]).inc();
    FILES_SCANNED_TOTAL.inc_by(result.files_discovered as f64);
    GROUPS_STAGED_TOTAL.inc_by(result.groups_staged as f64);
    GROUPS_FAILED_TOTAL.inc_by(result.groups_failed as f64);
}
