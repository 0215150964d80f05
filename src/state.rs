//! Shared application state for all routes.

use crate::registry::SchemaRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SchemaRegistry>,
}

impl AppState {
    pub fn new(registry: SchemaRegistry) -> Self {
        AppState {
            registry: Arc::new(registry),
        }
    }
}
