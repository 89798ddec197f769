//! Tolerant view of the Alertmanager webhook payload.
//!
//! Used for logging only. Forwarding always uses the raw captured bytes, and
//! a payload that fails to parse here is still relayed.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

/// One alert-group notification as sent by Alertmanager. Only the fields
/// that end up in a log line are kept; serde skips the rest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlertNotification {
    pub group_key: String,
    pub truncated_alerts: u64,
    pub status: String,
    pub receiver: String,
    pub common_annotations: BTreeMap<String, String>,
    #[serde(rename = "externalURL")]
    pub external_url: String,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Alert {
    pub status: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub starts_at: String,
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
    pub fingerprint: String,
}

/// The fields worth a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertSummary {
    pub receiver: String,
    pub status: String,
    pub group_key: String,
    pub external_url: String,
    pub alerts: usize,
    pub firing: usize,
    pub resolved: usize,
    pub truncated: u64,
    pub alertnames: Vec<String>,
    /// Common `summary` annotation, else the first alert's.
    pub summary: Option<String>,
    pub details: Vec<AlertDetail>,
}

/// Per-alert fields, logged at debug level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDetail {
    pub status: String,
    pub alertname: Option<String>,
    pub fingerprint: String,
    pub starts_at: String,
    pub generator_url: String,
    pub summary: Option<String>,
}

impl AlertSummary {
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let notification: AlertNotification = serde_json::from_slice(raw)?;
        Ok(Self::from(&notification))
    }

    pub fn log(&self, relay_id: &str) {
        tracing::info!(
            relay_id = %relay_id,
            receiver = %self.receiver,
            status = %self.status,
            group_key = %self.group_key,
            external_url = %self.external_url,
            alerts = self.alerts,
            firing = self.firing,
            resolved = self.resolved,
            truncated = self.truncated,
            alertnames = ?self.alertnames,
            summary = self.summary.as_deref().unwrap_or(""),
            "Alert notification received"
        );
        for detail in &self.details {
            tracing::debug!(
                relay_id = %relay_id,
                status = %detail.status,
                alertname = detail.alertname.as_deref().unwrap_or(""),
                fingerprint = %detail.fingerprint,
                starts_at = %detail.starts_at,
                generator_url = %detail.generator_url,
                summary = detail.summary.as_deref().unwrap_or(""),
                "Alert"
            );
        }
    }
}

impl From<&Alert> for AlertDetail {
    fn from(a: &Alert) -> Self {
        Self {
            status: a.status.clone(),
            alertname: a.labels.get("alertname").cloned(),
            fingerprint: a.fingerprint.clone(),
            starts_at: a.starts_at.clone(),
            generator_url: a.generator_url.clone(),
            summary: a.annotations.get("summary").cloned(),
        }
    }
}

impl From<&AlertNotification> for AlertSummary {
    fn from(n: &AlertNotification) -> Self {
        let count = |status: &str| n.alerts.iter().filter(|a| a.status == status).count();

        let alertnames: BTreeSet<&str> = n
            .alerts
            .iter()
            .filter_map(|a| a.labels.get("alertname"))
            .map(String::as_str)
            .collect();

        let details: Vec<AlertDetail> = n.alerts.iter().map(AlertDetail::from).collect();
        let summary = n
            .common_annotations
            .get("summary")
            .cloned()
            .or_else(|| details.iter().find_map(|d| d.summary.clone()));

        Self {
            receiver: n.receiver.clone(),
            status: n.status.clone(),
            group_key: n.group_key.clone(),
            external_url: n.external_url.clone(),
            alerts: n.alerts.len(),
            firing: count("firing"),
            resolved: count("resolved"),
            truncated: n.truncated_alerts,
            alertnames: alertnames.into_iter().map(str::to_string).collect(),
            summary,
            details,
        }
    }
}
