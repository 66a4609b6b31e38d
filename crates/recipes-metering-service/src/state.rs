//! Application state.

use crate::config::ServiceConfig;
use crate::metering::UsageProducer;

/// Application state shared across handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: ServiceConfig,

    /// Producer feeding the metering pipeline.
    pub usage: UsageProducer,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ServiceConfig, usage: UsageProducer) -> Self {
        if config.auth_jwt_secret.is_none() {
            tracing::warn!("AUTH_JWT_SECRET not set - metered routes will reject all requests");
        }

        Self { config, usage }
    }
}
