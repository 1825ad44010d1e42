//! Shared application state for request handlers.

use std::sync::Arc;
use tera::Tera;

use crate::checks::TestAggregator;
use crate::config::AppConfig;
use crate::downstream::Downstream;

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Everything here is immutable after startup; requests never share mutable state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tera: Arc<Tera>,
    pub downstream: Arc<Downstream>,
    pub aggregator: TestAggregator,
}

impl AppState {
    /// Builds the downstream clients and aggregator from a validated configuration.
    pub fn new(config: AppConfig, tera: Tera) -> Result<Self, crate::config::ConfigError> {
        let downstream = Arc::new(Downstream::new(&config.services)?);
        let aggregator = TestAggregator::new(
            downstream.clone(),
            config.checks.clone(),
            config.run.timeout(),
        );

        Ok(Self {
            config: Arc::new(config),
            tera: Arc::new(tera),
            downstream,
            aggregator,
        })
    }
}
