//! Authentication extractor for metered routes.
//!
//! Callers present a bearer JWT issued by the Recipes API token endpoint.
//! The token may carry a `stripe.customer.id` claim linking the caller to a
//! billing customer; requests from such callers are metered.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use recipes_metering_core::CustomerId;

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Claim carrying the caller's billing customer ID.
pub const BILLING_CUSTOMER_CLAIM: &str = "stripe.customer.id";

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The raw subject claim from the JWT.
    pub subject: String,
    /// The billing customer, if the caller has one.
    pub billing_customer_id: Option<CustomerId>,
}

impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            // Extract the Authorization header
            let auth_header = parts
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .ok_or(ApiError::Unauthorized)?;

            // Extract the Bearer token
            let token = auth_header
                .strip_prefix("Bearer ")
                .ok_or(ApiError::Unauthorized)?;

            let claims = validate_jwt(token, &state.config)?;

            Ok(Identity::from(claims))
        })
    }
}

/// JWT claims structure for Recipes API access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Audience (can be string or array).
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    /// Issuer.
    pub iss: String,
    /// Expiration time.
    pub exp: i64,
    /// Issued at.
    #[serde(default)]
    pub iat: i64,
    /// Billing customer ID, present for callers with a metered subscription.
    #[serde(
        rename = "stripe.customer.id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub stripe_customer_id: Option<String>,
}

impl From<JwtClaims> for Identity {
    fn from(claims: JwtClaims) -> Self {
        let billing_customer_id = claims.stripe_customer_id.and_then(|raw| {
            CustomerId::new(raw)
                .map_err(|e| {
                    tracing::debug!(
                        subject = %claims.sub,
                        claim = BILLING_CUSTOMER_CLAIM,
                        error = %e,
                        "Ignoring unusable billing customer claim"
                    );
                })
                .ok()
        });

        Self {
            subject: claims.sub,
            billing_customer_id,
        }
    }
}

/// Validate an HS256 JWT against the configured secret, issuer and audience.
fn validate_jwt(token: &str, config: &ServiceConfig) -> Result<JwtClaims, ApiError> {
    let secret = config.auth_jwt_secret.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("authentication is not configured".into())
    })?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[&config.auth_audience]);
    validation.set_issuer(&[&config.auth_issuer]);

    let token_data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        ApiError::Unauthorized
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn config() -> ServiceConfig {
        ServiceConfig {
            auth_jwt_secret: Some(SECRET.into()),
            ..ServiceConfig::default()
        }
    }

    fn claims(customer: Option<&str>) -> JwtClaims {
        let now = chrono::Utc::now().timestamp();
        JwtClaims {
            sub: "user-1".into(),
            aud: Some(serde_json::json!("recipes-api")),
            iss: "recipes-api".into(),
            exp: now + 3600,
            iat: now,
            stripe_customer_id: customer.map(String::from),
        }
    }

    fn sign(claims: &JwtClaims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_with_customer_claim() {
        let token = sign(&claims(Some("cus_42")), SECRET);

        let identity = Identity::from(validate_jwt(&token, &config()).unwrap());

        assert_eq!(identity.subject, "user-1");
        assert_eq!(
            identity.billing_customer_id,
            Some(CustomerId::new("cus_42").unwrap())
        );
    }

    #[test]
    fn valid_token_without_customer_claim() {
        let token = sign(&claims(None), SECRET);

        let identity = Identity::from(validate_jwt(&token, &config()).unwrap());

        assert!(identity.billing_customer_id.is_none());
    }

    #[test]
    fn empty_customer_claim_is_ignored() {
        let identity = Identity::from(claims(Some("")));
        assert!(identity.billing_customer_id.is_none());
    }

    #[test]
    fn customer_claim_uses_dotted_name() {
        let json = serde_json::to_value(claims(Some("cus_1"))).unwrap();
        assert_eq!(json[BILLING_CUSTOMER_CLAIM], "cus_1");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign(&claims(None), "other-secret");
        assert!(matches!(
            validate_jwt(&token, &config()),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let mut claims = claims(None);
        claims.aud = Some(serde_json::json!("someone-else"));
        let token = sign(&claims, SECRET);

        assert!(matches!(
            validate_jwt(&token, &config()),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut claims = claims(None);
        claims.exp = chrono::Utc::now().timestamp() - 3600;
        let token = sign(&claims, SECRET);

        assert!(matches!(
            validate_jwt(&token, &config()),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn missing_secret_is_unavailable() {
        let token = sign(&claims(None), SECRET);
        assert!(matches!(
            validate_jwt(&token, &ServiceConfig::default()),
            Err(ApiError::ServiceUnavailable(_))
        ));
    }
}
