use super::RequestsLoggingLevel;
use std::path::PathBuf;

#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub requests_logging_level: RequestsLoggingLevel,
    pub db_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 3001,
            metrics_port: 3002,
            requests_logging_level: RequestsLoggingLevel::Path,
            db_dir: PathBuf::from("."),
        }
    }
}
