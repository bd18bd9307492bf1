use std::sync::Arc;

use crate::config::Config;
use crate::document::SectionLocator;
use crate::llm_client::{GeneratorFactory, HttpGeneratorFactory};

/// Shared application state injected into all route handlers via Axum extractors.
/// Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Builds one generator per request. Tests swap in canned generators.
    pub generators: Arc<dyn GeneratorFactory>,
    pub locator: Arc<SectionLocator>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let generators = Arc::new(HttpGeneratorFactory::new(config.providers.clone()));
        Self::with_generators(config, generators)
    }

    pub fn with_generators(config: Config, generators: Arc<dyn GeneratorFactory>) -> Self {
        Self {
            locator: Arc::new(config.locator()),
            config: Arc::new(config),
            generators,
        }
    }
}
