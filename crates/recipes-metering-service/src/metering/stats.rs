//! Counters for the metering pipeline.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use serde::Serialize;

use super::worker::WorkerState;

/// Shared metering counters, updated by the producer and the worker.
#[derive(Debug, Default)]
pub struct MeteringStats {
    events_enqueued: AtomicU64,
    events_dropped: AtomicU64,
    events_received: AtomicU64,
    flushes: AtomicU64,
    records_delivered: AtomicU64,
    records_failed: AtomicU64,
    records_retained: AtomicU64,
    consecutive_failed_flushes: AtomicU64,
    worker_panics: AtomicU64,
    worker_state: AtomicU8,
}

/// Point-in-time copy of [`MeteringStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeteringSnapshot {
    /// Events accepted by the queue.
    pub events_enqueued: u64,
    /// Events rejected because the queue was closed.
    pub events_dropped: u64,
    /// Events taken off the queue by the worker.
    pub events_received: u64,
    /// Completed flushes.
    pub flushes: u64,
    /// Aggregated records accepted by the backend.
    pub records_delivered: u64,
    /// Delivery attempts that failed.
    pub records_failed: u64,
    /// Records currently held for the next flush.
    pub records_retained: u64,
    /// Flushes in a row that had at least one failed record.
    pub consecutive_failed_flushes: u64,
    /// Panics caught in the worker loop.
    pub worker_panics: u64,
    /// Where the worker is in its loop.
    pub worker_state: WorkerState,
}

impl MeteringStats {
    pub(crate) fn event_enqueued(&self) {
        self.events_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn event_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished flush and return the consecutive failure count.
    pub(crate) fn flush_completed(&self, delivered: usize, failed: usize) -> u64 {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.records_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.records_failed.fetch_add(failed as u64, Ordering::Relaxed);
        self.records_retained.store(failed as u64, Ordering::Relaxed);

        if failed == 0 {
            self.consecutive_failed_flushes.store(0, Ordering::Relaxed);
            0
        } else {
            self.consecutive_failed_flushes
                .fetch_add(1, Ordering::Relaxed)
                + 1
        }
    }

    pub(crate) fn worker_panicked(&self) {
        self.worker_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_worker_state(&self, state: WorkerState) {
        self.worker_state.store(state as u8, Ordering::Relaxed);
    }

    /// Take a snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MeteringSnapshot {
        MeteringSnapshot {
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            records_retained: self.records_retained.load(Ordering::Relaxed),
            consecutive_failed_flushes: self.consecutive_failed_flushes.load(Ordering::Relaxed),
            worker_panics: self.worker_panics.load(Ordering::Relaxed),
            worker_state: WorkerState::from_u8(self.worker_state.load(Ordering::Relaxed)),
        }
    }
}
