mod config;
mod http_layers;
pub mod metrics;
mod server;
mod session;
mod staging_routes;
mod state;

pub use config::ServerConfig;
pub use http_layers::{log_requests, RequestsLoggingLevel};
pub use server::run_server;
pub use session::AdminSession;
pub use state::ServerState;
