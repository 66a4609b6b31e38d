//! Common test utilities for recipes-metering integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use axum_test::TestServer;
use jsonwebtoken::{encode, EncodingKey, Header};

use recipes_metering_core::UsageEvent;
use recipes_metering_service::auth::JwtClaims;
use recipes_metering_service::metering::{EventQueue, MeteringStats, UsageReceiver};
use recipes_metering_service::{create_router, AppState, ServiceConfig, UsageProducer};

/// Secret used to sign test tokens.
pub const JWT_SECRET: &str = "integration-test-secret";

/// Test harness containing everything needed for integration tests.
///
/// Usage events produced by requests land in `receiver` instead of a
/// worker, so tests can inspect exactly what was enqueued.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Queue the server's producer writes to.
    pub queue: EventQueue,
    /// Receiving end of `queue`.
    pub receiver: UsageReceiver,
    /// Counters shared with the producer.
    pub stats: Arc<MeteringStats>,
}

impl TestHarness {
    /// Create a harness with authentication configured.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Create a harness with a specific configuration.
    pub fn with_config(config: ServiceConfig) -> Self {
        let (queue, receiver) = EventQueue::open();
        let stats = Arc::new(MeteringStats::default());
        let producer = UsageProducer::new(queue.clone(), stats.clone());

        let state = AppState::new(config, producer);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            queue,
            receiver,
            stats,
        }
    }

    /// Close the queue and collect every event that was enqueued.
    pub async fn drain_events(&mut self) -> Vec<UsageEvent> {
        self.queue.close();

        let mut events = Vec::new();
        while let Some(event) = self.receiver.receive().await {
            events.push(event);
        }
        events
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration with authentication enabled and Stripe disabled.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        listen_addr: "127.0.0.1:0".into(),
        auth_jwt_secret: Some(JWT_SECRET.into()),
        ..ServiceConfig::default()
    }
}

/// Mint a bearer token for `subject`, optionally linked to a billing customer.
pub fn token(subject: &str, customer: Option<&str>) -> String {
    token_signed_with(subject, customer, JWT_SECRET)
}

/// Mint a bearer token signed with an arbitrary secret.
pub fn token_signed_with(subject: &str, customer: Option<&str>, secret: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = JwtClaims {
        sub: subject.into(),
        aud: Some(serde_json::json!("recipes-api")),
        iss: "recipes-api".into(),
        exp: now + 3600,
        iat: now,
        stripe_customer_id: customer.map(String::from),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to sign test token")
}

/// Authorization header value for `token`.
pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).expect("Invalid header value")
}
