//! Delivery targets and the immutable registry that holds them.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use http::HeaderValue;
use reqwest::Url;

use crate::error::ConfigError;

/// Opaque credential sent as the `Authorization` header value.
///
/// Validated as a header value at load time so request construction cannot
/// fail per relay. Never printed.
#[derive(Clone)]
pub struct Credential(HeaderValue);

impl Credential {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut value = HeaderValue::from_str(raw).ok()?;
        value.set_sensitive(true);
        Some(Self(value))
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([redacted])")
    }
}

/// A downstream endpoint and the credential it expects.
#[derive(Debug, Clone)]
pub struct DeliveryTarget {
    pub address: Url,
    pub credential: Credential,
}

impl DeliveryTarget {
    pub fn new(address: Url, credential: Credential) -> Self {
        Self {
            address,
            credential,
        }
    }

    /// Parse a configured target. `position` is only used for error reporting.
    pub fn parse(position: usize, address: &str, credential: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidAddress {
            position,
            address: address.to_string(),
            reason,
        };

        let url = Url::parse(address).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
        }

        let credential =
            Credential::parse(credential).ok_or(ConfigError::InvalidCredential { position })?;

        Ok(Self::new(url, credential))
    }
}

/// Ordered, read-only list of targets. Cheap to clone (Arc); shared across
/// concurrent relays without locking.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: Arc<[DeliveryTarget]>,
}

impl TargetRegistry {
    pub fn new(targets: Vec<DeliveryTarget>) -> Self {
        Self {
            targets: targets.into(),
        }
    }
}

impl Deref for TargetRegistry {
    type Target = [DeliveryTarget];

    fn deref(&self) -> &Self::Target {
        &self.targets
    }
}
