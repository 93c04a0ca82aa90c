//! API server state

use std::sync::Arc;

use crate::recommend::RecommenderFacade;

/// API server state
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<RecommenderFacade>,
}

impl AppState {
    pub fn new(facade: Arc<RecommenderFacade>) -> Self {
        Self { facade }
    }
}
