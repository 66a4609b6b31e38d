//! The background loop that batches, aggregates and reports usage.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use tokio::time::Instant;

use recipes_metering_core::{merge_into, total_usage, AggregatedUsage, UsageEvent};

use super::accumulator::BatchAccumulator;
use super::queue::UsageReceiver;
use super::reporter::BillingReporter;
use super::stats::MeteringStats;
use crate::config::MeteringConfig;

/// Consecutive partially-failed flushes before the worker starts warning.
const FAILED_FLUSH_WARN_THRESHOLD: u64 = 5;

/// Where the worker is in its loop.
///
/// Published through [`MeteringStats`] as the worker moves between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WorkerState {
    /// Blocked on the queue.
    Waiting = 0,
    /// An event was received and appended to the batch.
    Accumulating = 1,
    /// Aggregating and delivering the batch.
    Flushing = 2,
    /// The queue is closed and the final batch has been handled.
    Stopped = 3,
}

impl WorkerState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Accumulating,
            2 => Self::Flushing,
            3 => Self::Stopped,
            _ => Self::Waiting,
        }
    }
}

/// What the worker did over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Events taken off the queue.
    pub events_received: u64,
    /// Flushes run, including the shutdown flush.
    pub flushes: u64,
    /// Usage units accepted by the backend.
    pub usage_delivered: u64,
    /// Records that could not be delivered before the shutdown deadline.
    pub dropped: Vec<AggregatedUsage>,
}

/// Single consumer of the usage event queue.
pub struct MeteringWorker {
    receiver: UsageReceiver,
    accumulator: BatchAccumulator,
    reporter: BillingReporter,
    retained: Vec<AggregatedUsage>,
    stats: Arc<MeteringStats>,
    state: WorkerState,
    shutdown_grace: Duration,
    shutdown_deadline: Option<Instant>,
    summary: WorkerSummary,
}

impl MeteringWorker {
    /// Create a worker that owns `receiver`.
    pub fn new(
        receiver: UsageReceiver,
        reporter: BillingReporter,
        config: &MeteringConfig,
        stats: Arc<MeteringStats>,
    ) -> Self {
        stats.set_worker_state(WorkerState::Waiting);

        Self {
            receiver,
            accumulator: BatchAccumulator::new(config.batch_size),
            reporter,
            retained: Vec::new(),
            stats,
            state: WorkerState::Waiting,
            shutdown_grace: config.shutdown_grace,
            shutdown_deadline: None,
            summary: WorkerSummary::default(),
        }
    }

    /// Current loop state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Records held back from failed deliveries.
    #[must_use]
    pub fn retained(&self) -> &[AggregatedUsage] {
        &self.retained
    }

    /// Run until the queue is closed and drained.
    ///
    /// Once the queue closes, every remaining delivery (buffered events and
    /// the final partial batch) shares one shutdown grace period. A panic
    /// while handling an event is logged and the loop carries on.
    pub async fn run(mut self) -> WorkerSummary {
        tracing::info!(
            batch_size = %self.accumulator.threshold(),
            "Metering worker started"
        );

        loop {
            let Some(event) = self.receiver.receive().await else {
                break;
            };
            self.observe_shutdown();

            let step = AssertUnwindSafe(self.accept(event)).catch_unwind().await;
            if step.is_err() {
                self.recover_from_panic();
            }
        }

        self.observe_shutdown();
        self.drain_on_shutdown().await;
        self.set_state(WorkerState::Stopped);

        tracing::info!(
            events_received = %self.summary.events_received,
            flushes = %self.summary.flushes,
            usage_delivered = %self.summary.usage_delivered,
            dropped_records = %self.summary.dropped.len(),
            "Metering worker stopped"
        );

        self.summary
    }

    fn set_state(&mut self, state: WorkerState) {
        self.state = state;
        self.stats.set_worker_state(state);
    }

    /// Start the shutdown clock the first time the queue is seen closed.
    fn observe_shutdown(&mut self) {
        if self.shutdown_deadline.is_none() && self.receiver.is_closed() {
            tracing::info!(
                grace_ms = %self.shutdown_grace.as_millis(),
                "Usage queue closed, draining within grace period"
            );
            self.shutdown_deadline = Some(Instant::now() + self.shutdown_grace);
        }
    }

    /// Put the loop back into a usable state after a caught panic.
    ///
    /// Records that were in flight during the panic are lost.
    fn recover_from_panic(&mut self) {
        self.stats.worker_panicked();
        tracing::error!(
            state = ?self.state,
            pending_events = %self.accumulator.len(),
            retained_records = %self.retained.len(),
            "Metering worker panicked while handling an event, continuing"
        );
        self.set_state(WorkerState::Waiting);
    }

    /// Accumulate one event, flushing if the threshold is reached.
    ///
    /// Returns whether a flush ran.
    async fn accept(&mut self, event: UsageEvent) -> bool {
        self.set_state(WorkerState::Accumulating);
        self.stats.event_received();
        self.summary.events_received += 1;

        let full = self.accumulator.push(event);
        if full {
            self.flush(self.shutdown_deadline).await;
        }

        self.set_state(WorkerState::Waiting);
        full
    }

    /// Aggregate the batch plus retained records and deliver them.
    async fn flush(&mut self, deadline: Option<Instant>) {
        self.set_state(WorkerState::Flushing);

        let events = self.accumulator.take();
        let records = merge_into(std::mem::take(&mut self.retained), &events);
        drop(events);

        tracing::debug!(
            records = %records.len(),
            total_usage = %total_usage(&records),
            "Flushing usage batch"
        );

        let report = self.reporter.report(records, deadline).await;

        self.summary.flushes += 1;
        self.summary.usage_delivered = self
            .summary
            .usage_delivered
            .saturating_add(total_usage(&report.delivered));

        let consecutive = self
            .stats
            .flush_completed(report.delivered.len(), report.failed.len());
        if consecutive >= FAILED_FLUSH_WARN_THRESHOLD {
            tracing::warn!(
                consecutive_failed_flushes = %consecutive,
                retained_records = %report.failed.len(),
                retained_usage = %total_usage(&report.failed),
                "Metering backend has been failing repeatedly"
            );
        }

        self.retained = report.failed;
    }

    async fn drain_on_shutdown(&mut self) {
        if self.accumulator.is_empty() && self.retained.is_empty() {
            return;
        }

        tracing::info!(
            pending_events = %self.accumulator.len(),
            retained_records = %self.retained.len(),
            "Flushing partial usage batch on shutdown"
        );

        let deadline = self
            .shutdown_deadline
            .unwrap_or_else(|| Instant::now() + self.shutdown_grace);
        self.flush(Some(deadline)).await;

        let dropped = std::mem::take(&mut self.retained);
        for record in &dropped {
            tracing::error!(
                customer_id = %record.customer_id,
                total_usage = %record.total_usage,
                "Usage could not be reported before shutdown and was dropped"
            );
        }
        self.summary.dropped = dropped;
    }
}
