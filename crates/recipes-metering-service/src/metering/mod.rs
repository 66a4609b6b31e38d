//! Usage metering pipeline.
//!
//! Authorized requests are counted per billing customer and reported to the
//! metered-billing backend in batches:
//!
//! ```text
//! request -> UsageProducer -> EventQueue -> MeteringWorker
//!         -> BatchAccumulator -> aggregate -> BillingReporter -> backend
//! ```
//!
//! Producers never wait on delivery. A single worker task owns batching and
//! delivery; failed records are retained for the next flush, and a partial
//! batch is flushed when the queue closes at shutdown.

pub mod accumulator;
pub mod backend;
pub mod producer;
pub mod queue;
pub mod reporter;
pub mod stats;
pub mod worker;

use std::sync::Arc;

use tokio::task::JoinHandle;

pub use accumulator::BatchAccumulator;
pub use backend::{backend_from_config, LoggingBackend, MeteringBackend, StripeMeterBackend};
pub use producer::{report_api_usage, UsageProducer};
pub use queue::{EventQueue, UsageReceiver};
pub use reporter::{BillingReporter, DeliveryReport};
pub use stats::{MeteringSnapshot, MeteringStats};
pub use worker::{MeteringWorker, WorkerState, WorkerSummary};

use crate::config::MeteringConfig;

/// A running metering pipeline: the queue plus its worker task.
pub struct MeteringPipeline {
    queue: EventQueue,
    stats: Arc<MeteringStats>,
    worker: JoinHandle<WorkerSummary>,
}

impl MeteringPipeline {
    /// Open the queue and spawn the worker.
    #[must_use]
    pub fn start(config: &MeteringConfig, backend: Arc<dyn MeteringBackend>) -> Self {
        let (queue, receiver) = EventQueue::open();
        let stats = Arc::new(MeteringStats::default());
        let reporter = BillingReporter::new(backend, config.delivery_timeout);
        let worker = MeteringWorker::new(receiver, reporter, config, stats.clone());

        Self {
            queue,
            stats,
            worker: tokio::spawn(worker.run()),
        }
    }

    /// A producer feeding this pipeline.
    #[must_use]
    pub fn producer(&self) -> UsageProducer {
        UsageProducer::new(self.queue.clone(), self.stats.clone())
    }

    /// Close the queue and wait for the worker to drain it.
    ///
    /// Returns `None` if the worker task panicked.
    pub async fn shutdown(self) -> Option<WorkerSummary> {
        self.queue.close();

        match self.worker.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::error!(error = %e, "Metering worker terminated abnormally");
                None
            }
        }
    }
}
