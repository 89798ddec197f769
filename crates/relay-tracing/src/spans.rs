//! Span builder helpers for relay instrumentation.

/// Create a tracing span for one relay invocation.
///
/// Usage: `let span = relay_request_span!(relay_id, endpoint);`
///
/// Summary fields recorded once dispatch finishes:
/// - `targets`: number of configured targets
/// - `delivered`: attempts that received an HTTP response
/// - `failed`: attempts that ended in a transport failure
#[macro_export]
macro_rules! relay_request_span {
    ($relay_id:expr, $endpoint:expr) => {
        tracing::info_span!(
            "relay_request",
            relay_id = %$relay_id,
            endpoint = %$endpoint,
            payload_bytes = tracing::field::Empty,
            targets = tracing::field::Empty,
            delivered = tracing::field::Empty,
            failed = tracing::field::Empty,
        )
    };
}

/// Create a tracing span for a single outbound delivery.
///
/// The target credential is never recorded.
#[macro_export]
macro_rules! delivery_span {
    ($relay_id:expr, $position:expr, $address:expr) => {
        tracing::info_span!(
            "delivery",
            relay_id = %$relay_id,
            position = $position,
            address = %$address,
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        )
    };
}
