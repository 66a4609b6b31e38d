//! Service configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::stripe::{meter, StripeClient};

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// HS256 secret for validating bearer tokens (optional).
    ///
    /// Without it every metered route rejects requests.
    pub auth_jwt_secret: Option<String>,

    /// Expected JWT issuer (default: "recipes-api").
    pub auth_issuer: String,

    /// Expected JWT audience (default: "recipes-api").
    pub auth_audience: String,

    /// Stripe API key (optional).
    pub stripe_api_key: Option<String>,

    /// Stripe API base URL.
    pub stripe_api_base: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Usage metering configuration.
    pub metering: MeteringConfig,
}

/// Usage metering configuration.
#[derive(Debug, Clone)]
pub struct MeteringConfig {
    /// Accumulated events that trigger a flush (default: 10).
    pub batch_size: usize,

    /// Meter event name reported to Stripe.
    pub event_name: String,

    /// Upper bound on a single delivery call.
    pub delivery_timeout: Duration,

    /// Time allowed for the final flush after the queue closes.
    pub shutdown_grace: Duration,
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            event_name: meter::API_REQUESTS_EVENT.into(),
            delivery_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    meter_event_name: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        // Try to load Stripe secrets from file first, then fall back to env vars
        let (stripe_api_key, secrets_event_name) = load_stripe_secrets();
        let defaults = MeteringConfig::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            auth_jwt_secret: std::env::var("AUTH_JWT_SECRET").ok(),
            auth_issuer: std::env::var("AUTH_ISSUER").unwrap_or_else(|_| "recipes-api".into()),
            auth_audience: std::env::var("AUTH_AUDIENCE").unwrap_or_else(|_| "recipes-api".into()),
            stripe_api_key,
            stripe_api_base: std::env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| StripeClient::DEFAULT_BASE_URL.into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS").unwrap_or(30),
            metering: MeteringConfig {
                batch_size: env_parse("METERING_BATCH_SIZE")
                    .unwrap_or(defaults.batch_size)
                    .max(1),
                event_name: std::env::var("STRIPE_METER_EVENT_NAME")
                    .ok()
                    .or(secrets_event_name)
                    .unwrap_or(defaults.event_name),
                delivery_timeout: env_parse("METERING_DELIVERY_TIMEOUT_SECONDS")
                    .map_or(defaults.delivery_timeout, Duration::from_secs),
                shutdown_grace: env_parse("METERING_SHUTDOWN_GRACE_SECONDS")
                    .map_or(defaults.shutdown_grace, Duration::from_secs),
            },
        }
    }
}

/// Parse an environment variable, ignoring missing or malformed values.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/stripe.json",
        "recipes-metering/.secrets/stripe.json",
        "../.secrets/stripe.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (Some(secrets.api_key), secrets.meter_event_name);
        }
    }

    // Fall back to environment variables
    tracing::debug!("Stripe secrets file not found, using environment variables");
    (std::env::var("STRIPE_API_KEY").ok(), None)
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            auth_jwt_secret: None,
            auth_issuer: "recipes-api".into(),
            auth_audience: "recipes-api".into(),
            stripe_api_key: None,
            stripe_api_base: StripeClient::DEFAULT_BASE_URL.into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            metering: MeteringConfig::default(),
        }
    }
}
