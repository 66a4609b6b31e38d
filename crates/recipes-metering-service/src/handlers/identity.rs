//! Caller identity handlers.

use axum::{Extension, Json};
use serde::Serialize;

use crate::auth::Identity;

/// Response for `GET /v1/me`.
#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    /// JWT subject.
    pub subject: String,
    /// Billing customer the request was metered against, if any.
    pub billing_customer_id: Option<String>,
}

/// Describe the authenticated caller.
pub async fn whoami(Extension(identity): Extension<Identity>) -> Json<IdentityResponse> {
    Json(IdentityResponse {
        subject: identity.subject,
        billing_customer_id: identity.billing_customer_id.map(String::from),
    })
}
