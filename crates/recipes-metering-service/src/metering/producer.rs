//! Request-pipeline hook that records one usage event per metered request.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use recipes_metering_core::UsageEvent;

use super::queue::EventQueue;
use super::stats::MeteringStats;
use crate::auth::Identity;
use crate::state::AppState;

/// Hands usage events to the queue on behalf of request handlers.
#[derive(Debug, Clone)]
pub struct UsageProducer {
    queue: EventQueue,
    stats: Arc<MeteringStats>,
}

impl UsageProducer {
    /// Create a producer for `queue`.
    #[must_use]
    pub fn new(queue: EventQueue, stats: Arc<MeteringStats>) -> Self {
        Self { queue, stats }
    }

    /// Record one billable request for the caller, if they have a billing
    /// customer. Never blocks.
    ///
    /// Returns whether an event was enqueued.
    pub fn record(&self, identity: &Identity) -> bool {
        let Some(customer_id) = identity.billing_customer_id.clone() else {
            return false;
        };

        match self.queue.submit(UsageEvent::single_request(customer_id)) {
            Ok(()) => {
                self.stats.event_enqueued();
                true
            }
            Err(e) => {
                self.stats.event_dropped();
                tracing::debug!(
                    subject = %identity.subject,
                    error = %e,
                    "Dropping usage event"
                );
                false
            }
        }
    }

    /// Shared metering counters.
    #[must_use]
    pub fn stats(&self) -> &MeteringStats {
        &self.stats
    }
}

/// Middleware for metered routes.
///
/// Rejects callers without a valid identity, makes the identity available to
/// handlers, and records usage after the handler has produced its response.
pub async fn report_api_usage(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(identity.clone());

    let response = next.run(request).await;

    state.usage.record(&identity);
    response
}
