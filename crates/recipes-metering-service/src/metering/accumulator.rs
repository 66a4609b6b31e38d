//! Consumer-owned buffer of dequeued usage events.

use recipes_metering_core::UsageEvent;

/// Buffers events until the batch threshold is reached.
///
/// Only the metering worker touches the accumulator, so it is a plain `Vec`.
#[derive(Debug)]
pub struct BatchAccumulator {
    events: Vec<UsageEvent>,
    threshold: usize,
}

impl BatchAccumulator {
    /// Create an accumulator. A threshold of zero is treated as one.
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            events: Vec::with_capacity(threshold),
            threshold,
        }
    }

    /// Append an event, returning `true` when the batch is ready to flush.
    pub fn push(&mut self, event: UsageEvent) -> bool {
        self.events.push(event);
        self.is_full()
    }

    /// Whether the accumulated count has reached the threshold.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.events.len() >= self.threshold
    }

    /// Remove and return every accumulated event.
    pub fn take(&mut self) -> Vec<UsageEvent> {
        std::mem::replace(&mut self.events, Vec::with_capacity(self.threshold))
    }

    /// Number of accumulated events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The configured batch threshold.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipes_metering_core::CustomerId;

    fn event() -> UsageEvent {
        UsageEvent::single_request(CustomerId::new("cus_1").unwrap())
    }

    #[test]
    fn signals_full_only_at_threshold() {
        let mut acc = BatchAccumulator::new(3);

        assert!(!acc.push(event()));
        assert!(!acc.push(event()));
        assert!(acc.push(event()));
        assert_eq!(acc.len(), 3);
    }

    #[test]
    fn take_empties_the_batch() {
        let mut acc = BatchAccumulator::new(2);
        acc.push(event());
        acc.push(event());

        let taken = acc.take();

        assert_eq!(taken.len(), 2);
        assert!(acc.is_empty());
        assert!(!acc.is_full());
    }

    #[test]
    fn zero_threshold_flushes_every_event() {
        let mut acc = BatchAccumulator::new(0);
        assert_eq!(acc.threshold(), 1);
        assert!(acc.push(event()));
    }
}
