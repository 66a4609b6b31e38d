//! Recipes metering HTTP API service.
//!
//! This crate provides the HTTP surface of the Recipes API metering service:
//!
//! - Bearer JWT authentication
//! - A usage-metering pipeline that counts authorized requests per billing
//!   customer and reports them to Stripe as meter events in batches
//!
//! # Authentication
//!
//! Callers present an HS256 JWT. Tokens carrying a `stripe.customer.id`
//! claim are metered; tokens without one are served but not counted.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::unused_async)] // Handlers are async for the axum Handler trait

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metering;
pub mod routes;
pub mod state;
pub mod stripe;

pub use auth::Identity;
pub use config::{MeteringConfig, ServiceConfig};
pub use error::ApiError;
pub use metering::{MeteringPipeline, UsageProducer};
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
