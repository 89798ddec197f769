//! Error types for the relay.
//!
//! Only [`CaptureError`] can fail a relay invocation. Per-target failures
//! are data ([`crate::relay::dispatch::FailureCause`]), and [`ConfigError`]
//! only occurs at startup.

use thiserror::Error;

/// The inbound body could not be buffered.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to read inbound body: {0}")]
    Read(String),
}

/// The target registry or server settings are unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("target {position}: invalid address {address:?}: {reason}")]
    InvalidAddress {
        position: usize,
        address: String,
        reason: String,
    },

    #[error("target {position}: credential is not a valid header value")]
    InvalidCredential { position: usize },

    #[error("dispatch.timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("dispatch.max_concurrent must be greater than zero")]
    ZeroConcurrency,

    #[error("dispatch.connect_timeout_secs must be greater than zero")]
    ZeroConnectTimeout,

    #[error("server.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("server.endpoint must start with '/', got {0:?}")]
    InvalidEndpoint(String),
}
