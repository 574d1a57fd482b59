//! HTTP API for the advising assistant

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::db::Database;
use crate::llm::ModelRegistry;
use crate::runtime::ProductionManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProductionManager>,
    pub db: Database,
    pub llm_registry: Arc<ModelRegistry>,
}

impl AppState {
    pub fn new(router: ProductionManager, db: Database, llm_registry: Arc<ModelRegistry>) -> Self {
        Self {
            router: Arc::new(router),
            db,
            llm_registry,
        }
    }
}
