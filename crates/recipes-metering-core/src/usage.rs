//! Usage event types and aggregation.
//!
//! This module defines the usage events recorded per authorized request and
//! the per-customer records they are folded into before being reported.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{MeteringError, Result};
use crate::CustomerId;

/// One unit (or more) of billable usage by one customer.
///
/// Events carry no identity beyond their payload: two events with identical
/// fields are distinct occurrences and both are counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEvent {
    customer_id: CustomerId,
    usage: u64,
}

impl UsageEvent {
    /// Create a usage event.
    ///
    /// # Errors
    ///
    /// Returns [`MeteringError::InvalidEvent`] if `usage` is zero.
    pub fn new(customer_id: CustomerId, usage: u64) -> Result<Self> {
        if usage == 0 {
            return Err(MeteringError::InvalidEvent(format!(
                "usage for customer {customer_id} must be positive"
            )));
        }
        Ok(Self { customer_id, usage })
    }

    /// Create an event for a single billable request.
    #[must_use]
    pub fn single_request(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            usage: 1,
        }
    }

    /// The billing customer this usage belongs to.
    #[must_use]
    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    /// Number of billable units.
    #[must_use]
    pub fn usage(&self) -> u64 {
        self.usage
    }
}

/// Summed usage for one customer within one flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedUsage {
    /// The billing customer.
    pub customer_id: CustomerId,
    /// Sum of `usage` across the customer's events in the flush.
    pub total_usage: u64,
}

/// Group events by customer and sum their usage.
///
/// The order of the returned records is unspecified.
#[must_use]
pub fn aggregate<'a, I>(events: I) -> Vec<AggregatedUsage>
where
    I: IntoIterator<Item = &'a UsageEvent>,
{
    merge_into(Vec::new(), events)
}

/// Fold events into existing records, producing one record per customer.
///
/// Used to combine records retained from a failed delivery with the events of
/// the next batch so a customer is reported at most once per flush. A
/// customer whose total would overflow `u64` is split across several records
/// instead, so no usage is lost.
#[must_use]
pub fn merge_into<'a, I>(records: Vec<AggregatedUsage>, events: I) -> Vec<AggregatedUsage>
where
    I: IntoIterator<Item = &'a UsageEvent>,
{
    let mut totals: HashMap<CustomerId, Vec<u64>> = HashMap::new();

    for record in records {
        add_usage(totals.entry(record.customer_id).or_default(), record.total_usage);
    }
    for event in events {
        add_usage(totals.entry(event.customer_id.clone()).or_default(), event.usage);
    }

    totals
        .into_iter()
        .flat_map(|(customer_id, parts)| {
            parts.into_iter().map(move |total_usage| AggregatedUsage {
                customer_id: customer_id.clone(),
                total_usage,
            })
        })
        .collect()
}

fn add_usage(parts: &mut Vec<u64>, usage: u64) {
    if let Some(last) = parts.last_mut() {
        if let Some(sum) = last.checked_add(usage) {
            *last = sum;
            return;
        }
    }
    parts.push(usage);
}

/// Sum of `total_usage` across records, saturating at `u64::MAX`.
#[must_use]
pub fn total_usage(records: &[AggregatedUsage]) -> u64 {
    records
        .iter()
        .fold(0, |sum, r| sum.saturating_add(r.total_usage))
}
