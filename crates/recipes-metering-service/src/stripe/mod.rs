//! Stripe integration for metered billing.
//!
//! Stripe handles:
//! - Recording usage through Billing meter events
//! - Turning recorded usage into invoices for metered prices

pub mod client;
pub mod types;

pub use client::StripeClient;
pub use client::StripeError;
pub use types::*;
