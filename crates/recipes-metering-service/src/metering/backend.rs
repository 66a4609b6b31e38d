//! Metering backends that receive aggregated usage.

use std::sync::Arc;

use async_trait::async_trait;

use recipes_metering_core::{AggregatedUsage, MeteringError};

use crate::config::ServiceConfig;
use crate::stripe::{MeterEventInput, StripeClient};

/// A metered-billing service that records usage against customers.
#[async_trait]
pub trait MeteringBackend: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Record one aggregated usage record.
    async fn create_meter_event(&self, record: &AggregatedUsage) -> Result<(), MeteringError>;
}

/// Reports usage to Stripe Billing meter events.
#[derive(Debug, Clone)]
pub struct StripeMeterBackend {
    client: StripeClient,
    event_name: String,
}

impl StripeMeterBackend {
    /// Create a backend reporting under `event_name`.
    pub fn new(client: StripeClient, event_name: impl Into<String>) -> Self {
        Self {
            client,
            event_name: event_name.into(),
        }
    }
}

#[async_trait]
impl MeteringBackend for StripeMeterBackend {
    fn name(&self) -> &str {
        "stripe"
    }

    async fn create_meter_event(&self, record: &AggregatedUsage) -> Result<(), MeteringError> {
        let input = MeterEventInput {
            event_name: self.event_name.clone(),
            customer_id: record.customer_id.to_string(),
            value: record.total_usage,
            timestamp: Some(chrono::Utc::now().timestamp()),
        };

        self.client
            .create_meter_event(&input)
            .await
            .map(|_| ())
            .map_err(|e| MeteringError::backend(self.name(), e.to_string()))
    }
}

/// Logs usage instead of reporting it. Used when Stripe is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingBackend;

#[async_trait]
impl MeteringBackend for LoggingBackend {
    fn name(&self) -> &str {
        "log"
    }

    async fn create_meter_event(&self, record: &AggregatedUsage) -> Result<(), MeteringError> {
        tracing::info!(
            customer_id = %record.customer_id,
            total_usage = %record.total_usage,
            "Usage aggregated (no metering backend configured)"
        );
        Ok(())
    }
}

/// Build the metering backend described by the configuration.
#[must_use]
pub fn backend_from_config(config: &ServiceConfig) -> Arc<dyn MeteringBackend> {
    let stripe = config.stripe_api_key.as_ref().and_then(|key| {
        match StripeClient::new(key) {
            Ok(client) => {
                tracing::info!(
                    api_base = %config.stripe_api_base,
                    event_name = %config.metering.event_name,
                    "Stripe metering enabled"
                );
                Some(client.with_base_url(&config.stripe_api_base))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to create Stripe client");
                None
            }
        }
    });

    match stripe {
        Some(client) => Arc::new(StripeMeterBackend::new(
            client,
            config.metering.event_name.clone(),
        )),
        None => {
            tracing::warn!("Stripe not configured - usage will be logged but not reported");
            Arc::new(LoggingBackend)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipes_metering_core::CustomerId;

    #[tokio::test]
    async fn logging_backend_accepts_everything() {
        let record = AggregatedUsage {
            customer_id: CustomerId::new("cus_1").unwrap(),
            total_usage: 3,
        };
        assert!(LoggingBackend.create_meter_event(&record).await.is_ok());
    }

    #[test]
    fn unconfigured_stripe_falls_back_to_logging() {
        let backend = backend_from_config(&ServiceConfig::default());
        assert_eq!(backend.name(), "log");
    }

    #[test]
    fn configured_stripe_is_selected() {
        let config = ServiceConfig {
            stripe_api_key: Some("sk_test_xxx".into()),
            ..ServiceConfig::default()
        };
        assert_eq!(backend_from_config(&config).name(), "stripe");
    }
}
