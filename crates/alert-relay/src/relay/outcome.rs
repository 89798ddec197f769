//! Aggregation of per-target attempts into a single relay outcome.
//!
//! A relay is accepted once the payload was captured and every target was
//! attempted. Individual target failures are reported for logging only; the
//! alert source is never asked to retry because one downstream was down.

use axum::http::StatusCode;
use serde::Serialize;

use super::dispatch::{DeliveryOutcome, RelayResult};

/// A target that did not produce an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    pub position: usize,
    pub address: String,
    pub cause: String,
    pub latency_ms: u64,
}

/// Summary of one relay invocation.
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub relay_id: String,
    pub targets: usize,
    pub delivered: usize,
    /// Delivered attempts whose response status was not 2xx.
    pub non_success_status: usize,
    pub failed: usize,
    pub failures: Vec<TargetFailure>,
}

/// Body returned to the original caller.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse<'a> {
    pub status: &'static str,
    pub relay_id: &'a str,
    pub targets: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl RelayOutcome {
    pub fn aggregate(relay_id: &str, result: &RelayResult) -> Self {
        let mut delivered = 0;
        let mut non_success_status = 0;
        let mut failures = Vec::new();

        for attempt in result.attempts() {
            match &attempt.outcome {
                DeliveryOutcome::Success { status } => {
                    delivered += 1;
                    if !(200..300).contains(status) {
                        non_success_status += 1;
                    }
                }
                DeliveryOutcome::TransportFailure(cause) => failures.push(TargetFailure {
                    position: attempt.position,
                    address: attempt.address.to_string(),
                    cause: cause.to_string(),
                    latency_ms: attempt.latency.as_millis() as u64,
                }),
            }
        }

        Self {
            relay_id: relay_id.to_string(),
            targets: result.len(),
            delivered,
            non_success_status,
            failed: failures.len(),
            failures,
        }
    }

    /// Status for the original caller. Target failures do not change it.
    pub fn status(&self) -> StatusCode {
        StatusCode::OK
    }

    pub fn response_body(&self) -> AcceptedResponse<'_> {
        AcceptedResponse {
            status: "accepted",
            relay_id: &self.relay_id,
            targets: self.targets,
            delivered: self.delivered,
            failed: self.failed,
        }
    }

    /// Emit the summary, plus one event per failed target.
    pub fn log(&self) {
        for failure in &self.failures {
            tracing::warn!(
                relay_id = %self.relay_id,
                position = failure.position,
                address = %failure.address,
                cause = %failure.cause,
                latency_ms = failure.latency_ms,
                "Target not reached"
            );
        }

        tracing::info!(
            relay_id = %self.relay_id,
            targets = self.targets,
            delivered = self.delivered,
            non_success_status = self.non_success_status,
            failed = self.failed,
            "Relay complete"
        );
    }
}
