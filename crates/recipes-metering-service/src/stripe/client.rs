//! Stripe API client implementation.

use reqwest::Client;
use std::time::Duration;

use super::types::{MeterEvent, MeterEventInput, StripeErrorResponse};

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {status} {error_type} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.stripe.com";

    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    pub fn new(api_key: impl Into<String>) -> Result<Self, StripeError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API host (e.g. a mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Record usage for a customer against a billing meter.
    pub async fn create_meter_event(
        &self,
        input: &MeterEventInput,
    ) -> Result<MeterEvent, StripeError> {
        tracing::debug!(
            event_name = %input.event_name,
            customer_id = %input.customer_id,
            value = %input.value,
            "Creating Stripe meter event"
        );

        let response = self
            .client
            .post(format!("{}/v1/billing/meter_events", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&input.to_form())
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        match error_body {
            Ok(stripe_error) => Err(StripeError::Api {
                status: status.as_u16(),
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(StripeError::Api {
                status: status.as_u16(),
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}
