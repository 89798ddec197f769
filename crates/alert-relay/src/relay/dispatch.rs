//! Fan-out of one captured payload to every target.
//!
//! Each send runs on its own tokio task. A per-relay semaphore bounds how
//! many are in flight; permits are taken in registry order, so sends start
//! in registry order. Results are collected by position from the ordered
//! handle list, never by completion order. Failures are recorded per
//! target and never propagated.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::Url;
use tokio::sync::Semaphore;
use tracing::Instrument;

use super::capture::CapturedPayload;
use super::correlation::CORRELATION_HEADER;
use super::target::DeliveryTarget;

/// Timing and concurrency knobs for a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Per-target send timeout.
    pub timeout: Duration,
    /// Sends in flight at once within one relay.
    pub max_concurrent: usize,
    /// Explicit upper bound for a whole relay. When `None` it is derived
    /// from `timeout` and `max_concurrent`.
    pub deadline: Option<Duration>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_concurrent: 1,
            deadline: None,
        }
    }
}

/// Why a delivery did not get an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The target's timeout or the relay deadline elapsed.
    Timeout,
    /// Connection, DNS or TLS failure.
    Connect(String),
    /// Any other error while sending or receiving.
    Request(String),
    /// The send task panicked or was cancelled.
    Aborted(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Timeout => f.write_str("timeout"),
            FailureCause::Connect(e) => write!(f, "connect: {e}"),
            FailureCause::Request(e) => write!(f, "request: {e}"),
            FailureCause::Aborted(e) => write!(f, "aborted: {e}"),
        }
    }
}

impl From<reqwest::Error> for FailureCause {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FailureCause::Timeout
        } else if e.is_connect() {
            FailureCause::Connect(error_chain(&e))
        } else {
            FailureCause::Request(error_chain(&e))
        }
    }
}

/// Render an error with its sources, so DNS/TLS detail is not lost behind
/// reqwest's generic top-level message.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut rendered = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        rendered.push_str(": ");
        rendered.push_str(&inner.to_string());
        source = inner.source();
    }
    rendered
}

/// Result of one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// A response arrived. Any status counts, 4xx and 5xx included.
    Success { status: u16 },
    TransportFailure(FailureCause),
}

/// One target's attempt within a relay.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    /// Index of the target in the registry.
    pub position: usize,
    pub address: Url,
    pub outcome: DeliveryOutcome,
    pub latency: Duration,
}

/// All attempts of one relay, indexed by registry position.
#[derive(Debug, Clone, Default)]
pub struct RelayResult {
    attempts: Vec<DeliveryAttempt>,
}

impl RelayResult {
    pub fn attempts(&self) -> &[DeliveryAttempt] {
        &self.attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }
}

impl From<Vec<DeliveryAttempt>> for RelayResult {
    fn from(attempts: Vec<DeliveryAttempt>) -> Self {
        Self { attempts }
    }
}

/// Sends captured payloads to targets. Cheap to clone; the inner
/// `reqwest::Client` is a shared connection pool.
#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(client: reqwest::Client, settings: DispatchSettings) -> Self {
        Self { client, settings }
    }

    /// Upper bound for relaying to `targets` targets: the per-target timeout
    /// times the number of sequential rounds the concurrency limit allows.
    pub fn deadline_for(&self, targets: usize) -> Duration {
        self.settings.deadline.unwrap_or_else(|| {
            let limit = self.settings.max_concurrent.max(1);
            let rounds = targets.div_ceil(limit).max(1);
            self.settings
                .timeout
                .saturating_mul(u32::try_from(rounds).unwrap_or(u32::MAX))
        })
    }

    /// Send `payload` to every target and collect one attempt per target.
    ///
    /// Never fails: unreachable or slow targets are recorded as transport
    /// failures. Targets with no outcome when the relay deadline elapses
    /// are recorded as timeouts and their sends are cancelled.
    pub async fn dispatch(
        &self,
        targets: &[DeliveryTarget],
        payload: &CapturedPayload,
        relay_id: &str,
    ) -> RelayResult {
        if targets.is_empty() {
            return RelayResult::default();
        }

        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.deadline_for(targets.len());
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent.max(1)));

        let mut handles = Vec::with_capacity(targets.len());
        for (position, target) in targets.iter().enumerate() {
            let permit =
                match tokio::time::timeout_at(deadline, semaphore.clone().acquire_owned()).await {
                    Ok(Ok(permit)) => permit,
                    Ok(Err(_)) | Err(_) => {
                        tracing::warn!(
                            relay_id = %relay_id,
                            unsent = targets.len() - position,
                            "Relay deadline reached before all targets were attempted"
                        );
                        break;
                    }
                };

            let send = deliver(
                self.client.clone(),
                target.clone(),
                payload.bytes().clone(),
                self.settings.timeout,
                relay_id.to_string(),
                position,
            );
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                send.await
            }));
        }

        let mut pending = handles.into_iter();
        let mut attempts = Vec::with_capacity(targets.len());
        for (position, target) in targets.iter().enumerate() {
            let (outcome, latency) = match pending.next() {
                Some(mut handle) => match tokio::time::timeout_at(deadline, &mut handle).await {
                    Ok(Ok(done)) => done,
                    Ok(Err(e)) => {
                        tracing::error!(error = %e, position, "Delivery task aborted");
                        (
                            DeliveryOutcome::TransportFailure(FailureCause::Aborted(e.to_string())),
                            started.elapsed(),
                        )
                    }
                    Err(_) => {
                        handle.abort();
                        tracing::warn!(
                            relay_id = %relay_id,
                            position,
                            address = %target.address,
                            "Relay deadline elapsed, cancelling delivery"
                        );
                        (
                            DeliveryOutcome::TransportFailure(FailureCause::Timeout),
                            started.elapsed(),
                        )
                    }
                },
                None => (
                    DeliveryOutcome::TransportFailure(FailureCause::Timeout),
                    started.elapsed(),
                ),
            };

            attempts.push(DeliveryAttempt {
                position,
                address: target.address.clone(),
                outcome,
                latency,
            });
        }

        RelayResult { attempts }
    }
}

/// POST the payload to a single target.
async fn deliver(
    client: reqwest::Client,
    target: DeliveryTarget,
    body: Bytes,
    timeout: Duration,
    relay_id: String,
    position: usize,
) -> (DeliveryOutcome, Duration) {
    let span = relay_tracing::delivery_span!(&relay_id, position, &target.address);

    async {
        let start = Instant::now();

        let result = tokio::time::timeout(
            timeout,
            client
                .post(target.address.clone())
                .header(http::header::CONTENT_TYPE, "application/json")
                .header(http::header::AUTHORIZATION, target.credential.header_value())
                .header(CORRELATION_HEADER, &relay_id)
                .body(body)
                .send(),
        )
        .await;

        let latency = start.elapsed();
        let latency_ms = latency.as_millis() as u64;
        tracing::Span::current().record("latency_ms", latency_ms);

        let outcome = match result {
            Ok(Ok(resp)) => {
                let status = resp.status().as_u16();
                tracing::Span::current().record("status", status);
                tracing::Span::current().record("outcome", "success");
                tracing::info!(status, latency_ms, "Delivery complete");
                DeliveryOutcome::Success { status }
            }
            Ok(Err(e)) => {
                let cause = FailureCause::from(e);
                tracing::Span::current().record("status", 0_u16);
                tracing::Span::current().record("outcome", "transport_failure");
                tracing::warn!(cause = %cause, latency_ms, "Delivery failed");
                DeliveryOutcome::TransportFailure(cause)
            }
            Err(_) => {
                tracing::Span::current().record("status", 0_u16);
                tracing::Span::current().record("outcome", "timeout");
                tracing::warn!(
                    latency_ms,
                    timeout_ms = timeout.as_millis() as u64,
                    "Delivery timed out"
                );
                DeliveryOutcome::TransportFailure(FailureCause::Timeout)
            }
        };

        (outcome, latency)
    }
    .instrument(span)
    .await
}
