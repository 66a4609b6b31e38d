//! Stripe API types.

use std::collections::HashMap;

use serde::Deserialize;

/// Meter event to create in Stripe Billing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterEventInput {
    /// Name of the meter's event (e.g. `standard_api_requests`).
    pub event_name: String,
    /// Stripe customer ID the usage is billed to.
    pub customer_id: String,
    /// Usage value to record.
    pub value: u64,
    /// Time of the usage (Unix seconds). Stripe uses the request time if unset.
    pub timestamp: Option<i64>,
}

impl MeterEventInput {
    /// Form parameters for `POST /v1/billing/meter_events`.
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("event_name".to_string(), self.event_name.clone()),
            (
                format!("payload[{}]", meter::CUSTOMER_PAYLOAD_KEY),
                self.customer_id.clone(),
            ),
            (
                format!("payload[{}]", meter::VALUE_PAYLOAD_KEY),
                self.value.to_string(),
            ),
        ];

        if let Some(timestamp) = self.timestamp {
            params.push(("timestamp".to_string(), timestamp.to_string()));
        }

        params
    }
}

/// Stripe meter event object.
#[derive(Debug, Clone, Deserialize)]
pub struct MeterEvent {
    /// Object type (always "billing.meter_event").
    #[serde(default)]
    pub object: String,
    /// Event name.
    pub event_name: String,
    /// Idempotency identifier assigned to the event.
    #[serde(default)]
    pub identifier: Option<String>,
    /// Event payload as recorded by Stripe.
    #[serde(default)]
    pub payload: HashMap<String, String>,
    /// Usage timestamp (Unix).
    #[serde(default)]
    pub timestamp: i64,
    /// Whether the event was recorded in live mode.
    #[serde(default)]
    pub livemode: bool,
}

/// Stripe API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Parameter that caused the error.
    #[serde(default)]
    pub param: Option<String>,
}

/// Meter event names and payload keys we use.
pub mod meter {
    /// Event name for metered API requests.
    pub const API_REQUESTS_EVENT: &str = "standard_api_requests";
    /// Payload key carrying the Stripe customer ID.
    pub const CUSTOMER_PAYLOAD_KEY: &str = "stripe_customer_id";
    /// Payload key carrying the usage value.
    pub const VALUE_PAYLOAD_KEY: &str = "requests";
}
