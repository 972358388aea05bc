//! Melodee staging pipeline library.
//!
//! Walks an inbound library, groups files into albums, stages them onto a
//! staging root with generated metadata sidecars, and hands them to an
//! operator-facing review API that approves, rejects or promotes them into
//! the production catalog.

pub mod background_jobs;
pub mod catalog_store;
pub mod config;
pub mod grouper;
pub mod library;
pub mod path_planner;
pub mod promotion;
pub mod review_store;
pub mod scanner;
pub mod scratch_store;
pub mod server;
pub mod sidecar;
pub mod sqlite_persistence;
pub mod staging_processor;
pub mod tag_reader;

pub use config::{AppConfig, CliConfig, FileConfig};
pub use server::{run_server, RequestsLoggingLevel};
