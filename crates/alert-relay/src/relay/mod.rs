//! The relay pipeline: capture the inbound body once, fan it out to every
//! target, aggregate the per-target results.

pub mod capture;
pub mod correlation;
pub mod dispatch;
pub mod outcome;
pub mod target;

use axum::body::Body;

use crate::alert::AlertSummary;
use crate::error::CaptureError;
use crate::stats::RelayStats;
use capture::capture;
use dispatch::Dispatcher;
use outcome::RelayOutcome;
use target::TargetRegistry;

/// Everything a relay invocation needs. Cheap to clone and shared by all
/// request handlers; nothing in it is mutated after startup apart from the
/// atomic stats counters.
#[derive(Clone)]
pub struct Relay {
    registry: TargetRegistry,
    dispatcher: Dispatcher,
    max_body_bytes: usize,
    stats: RelayStats,
}

impl Relay {
    pub fn new(
        registry: TargetRegistry,
        dispatcher: Dispatcher,
        max_body_bytes: usize,
        stats: RelayStats,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            max_body_bytes,
            stats,
        }
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    /// Relay one inbound body to every configured target.
    ///
    /// Only a capture failure is an error. Once the body is buffered every
    /// target is attempted and the relay is accepted whatever the targets
    /// answered.
    pub async fn relay(&self, body: Body, relay_id: &str) -> Result<RelayOutcome, CaptureError> {
        self.stats.inc_relays();

        let payload = match capture(body, self.max_body_bytes).await {
            Ok(payload) => payload,
            Err(e) => {
                self.stats.inc_capture_failures();
                tracing::error!(relay_id = %relay_id, error = %e, "Failed to capture inbound body");
                return Err(e);
            }
        };
        tracing::Span::current().record("payload_bytes", payload.len());
        if payload.is_empty() {
            tracing::warn!(relay_id = %relay_id, "Inbound body is empty, forwarding anyway");
        }

        match AlertSummary::parse(payload.bytes()) {
            Ok(summary) => summary.log(relay_id),
            Err(e) => tracing::warn!(
                relay_id = %relay_id,
                error = %e,
                "Payload is not an Alertmanager notification, forwarding unchanged"
            ),
        }

        let result = self
            .dispatcher
            .dispatch(&self.registry, &payload, relay_id)
            .await;
        let outcome = RelayOutcome::aggregate(relay_id, &result);

        let span = tracing::Span::current();
        span.record("targets", outcome.targets);
        span.record("delivered", outcome.delivered);
        span.record("failed", outcome.failed);

        self.stats.record_outcome(&outcome);
        outcome.log();

        Ok(outcome)
    }
}
