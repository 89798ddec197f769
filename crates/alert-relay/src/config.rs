//! Configuration types and loading logic.

use std::fmt;
use std::time::Duration;

use figment::providers::{Env, Format, Toml, Yaml};
use figment::Figment;
use relay_tracing::TracingConfig;
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::relay::dispatch::DispatchSettings;
use crate::relay::target::{DeliveryTarget, TargetRegistry};

/// Top-level relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
    pub targets: Vec<TargetConfig>,
}

/// Server listen configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Bare port, binds on all interfaces. Takes precedence over
    /// `listen_address` when set. Accepts a number or a quoted string.
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<u16>,

    /// Path the inbound webhook is POSTed to.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Outbound delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Per-target request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Sends in flight at once within a single relay. 1 means sequential.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Upper bound for a whole relay. Derived from the per-target timeout
    /// when unset.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

/// One downstream endpoint.
#[derive(Clone, Deserialize)]
pub struct TargetConfig {
    #[serde(alias = "url")]
    pub address: String,

    /// Sent verbatim as the `Authorization` header value.
    #[serde(alias = "token")]
    pub credential: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("address", &self.address)
            .field("credential", &"[redacted]")
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<PortValue>::deserialize(deserializer)? {
        None => Ok(None),
        Some(PortValue::Number(port)) => Ok(Some(port)),
        Some(PortValue::Text(raw)) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid port {raw:?}: {e}"))),
    }
}

fn default_listen_address() -> String {
    "0.0.0.0:9095".to_string()
}

fn default_endpoint() -> String {
    "/".to_string()
}

fn default_max_body_bytes() -> usize {
    4 * 1024 * 1024
}

fn default_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_max_concurrent() -> usize {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            port: None,
            endpoint: default_endpoint(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_concurrent: default_max_concurrent(),
            deadline_secs: None,
        }
    }
}

impl ServerConfig {
    /// The socket address to bind.
    pub fn bind_address(&self) -> String {
        match self.port {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.listen_address.clone(),
        }
    }
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn settings(&self) -> DispatchSettings {
        DispatchSettings {
            timeout: self.timeout(),
            max_concurrent: self.max_concurrent,
            deadline: self.deadline_secs.map(Duration::from_secs),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML or YAML file and environment variables.
    /// Files ending in `.yml`/`.yaml` are read as YAML, anything else as TOML.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (RELAY_ prefix, __ for nesting)
    /// 2. Config file
    /// 3. Defaults
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        let figment = if is_yaml(config_path) {
            Figment::new().merge(Yaml::file(config_path))
        } else {
            Figment::new().merge(Toml::file(config_path))
        };
        let config: RelayConfig = figment
            .merge(Env::prefixed("RELAY_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Check settings and build the immutable target registry.
    pub fn validate(&self) -> Result<TargetRegistry, ConfigError> {
        if !self.server.endpoint.starts_with('/') {
            return Err(ConfigError::InvalidEndpoint(self.server.endpoint.clone()));
        }
        if self.dispatch.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.dispatch.max_concurrent == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.dispatch.connect_timeout_secs == 0 {
            return Err(ConfigError::ZeroConnectTimeout);
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::ZeroBodyLimit);
        }

        let targets = self
            .targets
            .iter()
            .enumerate()
            .map(|(position, t)| DeliveryTarget::parse(position, &t.address, &t.credential))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TargetRegistry::new(targets))
    }
}

fn is_yaml(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".yml") || lower.ends_with(".yaml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const BASIC: &str = r#"
        [server]
        endpoint = "/alerts"

        [[targets]]
        address = "http://hooks.internal/a"
        credential = "Bearer tokenA"

        [[targets]]
        url = "https://hooks.internal/b"
        token = "tokenB"
    "#;

    #[test]
    fn test_load_toml_with_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("relay.toml", BASIC)?;
            let config = RelayConfig::load("relay.toml").expect("config loads");

            assert_eq!(config.server.endpoint, "/alerts");
            assert_eq!(config.server.bind_address(), "0.0.0.0:9095");
            assert_eq!(config.dispatch.timeout_secs, 10);
            assert_eq!(config.dispatch.max_concurrent, 1);
            assert_eq!(config.targets.len(), 2);
            assert_eq!(config.targets[1].address, "https://hooks.internal/b");
            assert_eq!(config.targets[1].credential, "tokenB");

            let registry = config.validate().expect("valid registry");
            assert_eq!(registry.len(), 2);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("relay.toml", BASIC)?;
            jail.set_env("RELAY_DISPATCH__TIMEOUT_SECS", "3");
            jail.set_env("RELAY_SERVER__PORT", "8080");
            let config = RelayConfig::load("relay.toml").expect("config loads");

            assert_eq!(config.dispatch.timeout(), Duration::from_secs(3));
            assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
            Ok(())
        });
    }

    #[test]
    fn test_load_legacy_yaml_layout() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yml",
                r#"
server:
  port: "9095"
  endpoint: "/alertmanager"
targets:
  - url: "https://hooks.internal/a"
    token: "Bearer tokenA"
  - url: "http://hooks.internal/b"
    token: "tokenB"
"#,
            )?;
            let config = RelayConfig::load("config.yml").expect("yaml config loads");

            assert_eq!(config.server.bind_address(), "0.0.0.0:9095");
            assert_eq!(config.server.endpoint, "/alertmanager");
            assert_eq!(config.targets[0].address, "https://hooks.internal/a");
            assert_eq!(config.targets[0].credential, "Bearer tokenA");

            let registry = config.validate().expect("valid registry");
            assert_eq!(registry.len(), 2);
            Ok(())
        });
    }

    #[test]
    fn test_numeric_port_in_toml() {
        Jail::expect_with(|jail| {
            jail.create_file("relay.toml", "targets = []\n[server]\nport = 9100\n")?;
            let config = RelayConfig::load("relay.toml").expect("config loads");
            assert_eq!(config.server.bind_address(), "0.0.0.0:9100");
            Ok(())
        });
    }

    #[test]
    fn test_non_numeric_port_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "server:\n  port: \"http\"\ntargets: []\n")?;
            assert!(RelayConfig::load("config.yaml").is_err());
            Ok(())
        });
    }

    #[test]
    fn test_missing_targets_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file("relay.toml", "[server]\nendpoint = \"/\"\n")?;
            assert!(RelayConfig::load("relay.toml").is_err());
            Ok(())
        });
    }

    #[test]
    fn test_empty_target_list_is_valid() {
        Jail::expect_with(|jail| {
            jail.create_file("relay.toml", "targets = []\n")?;
            let config = RelayConfig::load("relay.toml").expect("config loads");
            assert!(config.validate().expect("valid").is_empty());
            Ok(())
        });
    }

    fn config_with(targets: Vec<TargetConfig>) -> RelayConfig {
        RelayConfig {
            server: ServerConfig::default(),
            dispatch: DispatchConfig::default(),
            tracing: TracingConfig::default(),
            targets,
        }
    }

    #[test]
    fn test_validate_rejects_bad_address() {
        let config = config_with(vec![TargetConfig {
            address: "not a url".into(),
            credential: "x".into(),
        }]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAddress { position: 0, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let config = config_with(vec![TargetConfig {
            address: "ftp://files.internal/drop".into(),
            credential: "x".into(),
        }]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_credential_with_newline() {
        let config = config_with(vec![
            TargetConfig {
                address: "http://a.internal/".into(),
                credential: "ok".into(),
            },
            TargetConfig {
                address: "http://b.internal/".into(),
                credential: "bad\nvalue".into(),
            },
        ]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCredential { position: 1 })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = config_with(vec![]);
        config.dispatch.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));

        let mut config = config_with(vec![]);
        config.dispatch.max_concurrent = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroConcurrency)));

        let mut config = config_with(vec![]);
        config.dispatch.connect_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroConnectTimeout)
        ));

        let mut config = config_with(vec![]);
        config.server.max_body_bytes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroBodyLimit)));

        let mut config = config_with(vec![]);
        config.server.endpoint = "alerts".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_debug_redacts_credential() {
        let target = TargetConfig {
            address: "http://a.internal/".into(),
            credential: "super-secret".into(),
        };
        let rendered = format!("{target:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[redacted]"));
    }
}
