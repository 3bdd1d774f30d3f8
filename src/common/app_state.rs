use std::sync::Arc;

use crate::common::{aliases::DbPool, config::AppConfig};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db_pool: DbPool, config: AppConfig) -> Self {
        Self {
            db_pool,
            config: Arc::new(config),
        }
    }
}
