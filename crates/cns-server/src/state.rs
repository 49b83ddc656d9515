use std::sync::Arc;

use cns_service::ObjectService;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ObjectService>,
}

impl AppState {
    pub fn new(service: Arc<ObjectService>) -> Self {
        Self { service }
    }
}
