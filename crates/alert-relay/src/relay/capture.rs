//! Single-read buffering of the inbound body.
//!
//! The inbound stream is not replayable, so it is read to the end exactly
//! once before any outbound send starts. Every target then shares the same
//! buffer.

use axum::body::Body;
use bytes::Bytes;

use crate::error::CaptureError;

/// The raw inbound body. Clones share one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPayload(Bytes);

impl CapturedPayload {
    pub fn bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Bytes> for CapturedPayload {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

/// Read `body` to exhaustion, failing if the stream errors or exceeds `limit`.
pub async fn capture(body: Body, limit: usize) -> Result<CapturedPayload, CaptureError> {
    axum::body::to_bytes(body, limit)
        .await
        .map(CapturedPayload)
        .map_err(|e| CaptureError::Read(e.to_string()))
}
