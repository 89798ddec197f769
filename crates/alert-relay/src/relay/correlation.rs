//! Relay id generation for request tracing.

use uuid::Uuid;

/// Header carrying the relay id, on outbound deliveries and on the response
/// to the original caller.
pub const CORRELATION_HEADER: &str = "x-relay-request-id";

/// Generate a new relay id (UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
