use axum::extract::FromRef;
use std::sync::Arc;

use crate::catalog_store::SqliteCatalogStore;
use crate::promotion::PromotionEngine;
use crate::review_store::SqliteReviewStore;

use super::ServerConfig;

pub type GuardedCatalogStore = Arc<SqliteCatalogStore>;
pub type GuardedPromotionEngine = Arc<PromotionEngine<SqliteCatalogStore>>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub review_store: SqliteReviewStore,
    pub catalog_store: GuardedCatalogStore,
    pub promotion_engine: GuardedPromotionEngine,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for SqliteReviewStore {
    fn from_ref(input: &ServerState) -> Self {
        input.review_store.clone()
    }
}

impl FromRef<ServerState> for GuardedCatalogStore {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog_store.clone()
    }
}

impl FromRef<ServerState> for GuardedPromotionEngine {
    fn from_ref(input: &ServerState) -> Self {
        input.promotion_engine.clone()
    }
}
