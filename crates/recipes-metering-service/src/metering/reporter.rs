//! Delivery of aggregated usage records to the metering backend.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;

use recipes_metering_core::{AggregatedUsage, MeteringError};

use super::backend::MeteringBackend;

/// Outcome of delivering one flush worth of records.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Records the backend accepted.
    pub delivered: Vec<AggregatedUsage>,
    /// Records that failed, timed out, or were not attempted before the deadline.
    pub failed: Vec<AggregatedUsage>,
}

/// Sends aggregated records to a [`MeteringBackend`] one at a time.
#[derive(Clone)]
pub struct BillingReporter {
    backend: Arc<dyn MeteringBackend>,
    delivery_timeout: Duration,
}

impl BillingReporter {
    /// Create a reporter. Each backend call is bounded by `delivery_timeout`.
    pub fn new(backend: Arc<dyn MeteringBackend>, delivery_timeout: Duration) -> Self {
        Self {
            backend,
            delivery_timeout,
        }
    }

    /// Deliver every record, isolating failures per record.
    ///
    /// Records are sent sequentially. When `deadline` is set, no call runs
    /// past it; records not attempted in time are reported as failed.
    pub async fn report(
        &self,
        records: Vec<AggregatedUsage>,
        deadline: Option<Instant>,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for record in records {
            let timeout = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        report.failed.push(record);
                        continue;
                    }
                    remaining.min(self.delivery_timeout)
                }
                None => self.delivery_timeout,
            };

            match self.deliver(&record, timeout).await {
                Ok(()) => {
                    tracing::debug!(
                        backend = %self.backend.name(),
                        customer_id = %record.customer_id,
                        total_usage = %record.total_usage,
                        "Usage reported"
                    );
                    report.delivered.push(record);
                }
                Err(e) => {
                    tracing::warn!(
                        backend = %self.backend.name(),
                        customer_id = %record.customer_id,
                        total_usage = %record.total_usage,
                        error = %e,
                        "Failed to report usage, retaining for next flush"
                    );
                    report.failed.push(record);
                }
            }
        }

        report
    }

    async fn deliver(&self, record: &AggregatedUsage, timeout: Duration) -> Result<(), MeteringError> {
        let call = AssertUnwindSafe(self.backend.create_meter_event(record)).catch_unwind();

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(MeteringError::backend(
                self.backend.name(),
                "delivery panicked",
            )),
            Err(_) => Err(MeteringError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recipes_metering_core::CustomerId;

    struct FlakyBackend;

    #[async_trait]
    impl MeteringBackend for FlakyBackend {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn create_meter_event(&self, record: &AggregatedUsage) -> Result<(), MeteringError> {
            match record.customer_id.as_str() {
                "fails" => Err(MeteringError::backend("flaky", "rejected")),
                "panics" => panic!("backend bug"),
                "hangs" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                _ => Ok(()),
            }
        }
    }

    fn record(customer: &str) -> AggregatedUsage {
        AggregatedUsage {
            customer_id: CustomerId::new(customer).unwrap(),
            total_usage: 1,
        }
    }

    fn names(records: &[AggregatedUsage]) -> Vec<&str> {
        records.iter().map(|r| r.customer_id.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_block_remaining_records() {
        let reporter = BillingReporter::new(Arc::new(FlakyBackend), Duration::from_secs(5));

        let report = reporter
            .report(
                vec![
                    record("fails"),
                    record("ok_1"),
                    record("panics"),
                    record("hangs"),
                    record("ok_2"),
                ],
                None,
            )
            .await;

        assert_eq!(names(&report.delivered), vec!["ok_1", "ok_2"]);
        assert_eq!(names(&report.failed), vec!["fails", "panics", "hangs"]);
    }

    #[tokio::test(start_paused = true)]
    async fn records_past_the_deadline_are_not_attempted() {
        let reporter = BillingReporter::new(Arc::new(FlakyBackend), Duration::from_secs(60));
        let deadline = Instant::now() + Duration::from_secs(1);

        let report = reporter
            .report(vec![record("hangs"), record("ok_1")], Some(deadline))
            .await;

        assert!(report.delivered.is_empty());
        assert_eq!(names(&report.failed), vec!["hangs", "ok_1"]);
    }
}
