use std::sync::Arc;
use formulio_core::{CatalogStore, Config, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<CatalogStore>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<CatalogStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &CatalogStore {
        self.store.as_ref()
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }
}
