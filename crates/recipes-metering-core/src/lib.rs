//! Core types for Recipes API usage metering.
//!
//! This crate provides the value types shared by the metering pipeline:
//!
//! - **Identifiers**: `CustomerId`
//! - **Usage**: `UsageEvent`, `AggregatedUsage`
//! - **Aggregation**: `aggregate`, `merge_into`
//!
//! # Billing unit
//!
//! **1 usage unit = 1 authorized API request**
//!
//! - A request made by a caller with a billing customer attached produces
//!   one `UsageEvent` with `usage = 1`
//! - Events are summed per customer before being reported to the metered
//!   billing backend
//! - Stored as `u64` so sums never go negative or lose precision

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod usage;

pub use error::{MeteringError, Result};
pub use ids::{CustomerId, IdError};
pub use usage::{aggregate, merge_into, total_usage, AggregatedUsage, UsageEvent};
