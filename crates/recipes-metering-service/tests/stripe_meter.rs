//! Stripe meter event client tests against a mock Stripe API.

use serde_json::json;
use wiremock::matchers::{basic_auth, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use recipes_metering_core::{AggregatedUsage, CustomerId, MeteringError};
use recipes_metering_service::metering::{MeteringBackend, StripeMeterBackend};
use recipes_metering_service::stripe::{meter, MeterEventInput};
use recipes_metering_service::{StripeClient, StripeError};

fn client(server: &MockServer) -> StripeClient {
    StripeClient::new("sk_test_123")
        .expect("Failed to create Stripe client")
        .with_base_url(&server.uri())
}

fn input(customer: &str, value: u64) -> MeterEventInput {
    MeterEventInput {
        event_name: meter::API_REQUESTS_EVENT.into(),
        customer_id: customer.into(),
        value,
        timestamp: Some(1_700_000_000),
    }
}

#[tokio::test]
async fn meter_event_is_posted_as_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/billing/meter_events"))
        .and(basic_auth("sk_test_123", ""))
        .and(body_string_contains("event_name=standard_api_requests"))
        .and(body_string_contains("payload%5Bstripe_customer_id%5D=cus_1"))
        .and(body_string_contains("payload%5Brequests%5D=13"))
        .and(body_string_contains("timestamp=1700000000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "billing.meter_event",
            "event_name": "standard_api_requests",
            "identifier": "mev_abc",
            "payload": {"stripe_customer_id": "cus_1", "requests": "13"},
            "timestamp": 1_700_000_000,
            "livemode": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let event = client(&server)
        .create_meter_event(&input("cus_1", 13))
        .await
        .expect("meter event should be created");

    assert_eq!(event.event_name, "standard_api_requests");
    assert_eq!(event.identifier.as_deref(), Some("mev_abc"));
    assert_eq!(event.payload["requests"], "13");
}

#[tokio::test]
async fn stripe_error_body_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/billing/meter_events"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "message": "No such customer: 'cus_missing'",
                "code": "resource_missing",
                "param": "payload[stripe_customer_id]"
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .create_meter_event(&input("cus_missing", 1))
        .await
        .unwrap_err();

    match err {
        StripeError::Api {
            status,
            error_type,
            code,
            ..
        } => {
            assert_eq!(status, 400);
            assert_eq!(error_type, "invalid_request_error");
            assert_eq!(code.as_deref(), Some("resource_missing"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unparseable_error_body_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/billing/meter_events"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client(&server)
        .create_meter_event(&input("cus_1", 1))
        .await
        .unwrap_err();

    assert!(matches!(err, StripeError::Api { status: 502, .. }));
}

#[tokio::test]
async fn backend_reports_aggregated_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/billing/meter_events"))
        .and(body_string_contains("event_name=recipe_calls"))
        .and(body_string_contains("payload%5Bstripe_customer_id%5D=cus_7"))
        .and(body_string_contains("payload%5Brequests%5D=4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "billing.meter_event",
            "event_name": "recipe_calls"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = StripeMeterBackend::new(client(&server), "recipe_calls");
    let record = AggregatedUsage {
        customer_id: CustomerId::new("cus_7").unwrap(),
        total_usage: 4,
    };

    backend.create_meter_event(&record).await.unwrap();
}

#[tokio::test]
async fn backend_maps_stripe_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/billing/meter_events"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"type": "api_error", "message": "Something went wrong"}
        })))
        .mount(&server)
        .await;

    let backend = StripeMeterBackend::new(client(&server), meter::API_REQUESTS_EVENT);
    let record = AggregatedUsage {
        customer_id: CustomerId::new("cus_7").unwrap(),
        total_usage: 4,
    };

    let err = backend.create_meter_event(&record).await.unwrap_err();
    assert!(matches!(err, MeteringError::Backend { ref backend, .. } if backend == "stripe"));
}
