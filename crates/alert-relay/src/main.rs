//! alert-relay: receives Alertmanager webhook notifications and fans each
//! one out to a configured list of downstream endpoints, each with its own
//! Authorization credential.

mod alert;
mod config;
mod error;
mod relay;
mod server;
mod stats;

use config::RelayConfig;
use relay::dispatch::Dispatcher;
use relay::Relay;
use server::AppState;
use stats::RelayStats;

fn main() -> anyhow::Result<()> {
    // Determine config path
    let config_path = {
        let args: Vec<String> = std::env::args().collect();
        args.iter()
            .position(|a| a == "--config")
            .and_then(|i| args.get(i + 1).cloned())
            .or_else(|| args.get(1).filter(|a| !a.starts_with('-')).cloned())
            .or_else(|| std::env::var("RELAY_CONFIG").ok())
            .unwrap_or_else(default_config_path)
    };

    // Load and validate configuration. Any failure here is fatal.
    let config = RelayConfig::load(&config_path)?;
    let registry = config.validate()?;

    // Build the tokio runtime first; the tonic gRPC exporter needs a reactor context
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let tracing_guard = relay_tracing::init_tracing(&config.tracing);

        tracing::info!(
            config_path = %config_path,
            listen_address = %config.server.bind_address(),
            endpoint = %config.server.endpoint,
            targets = registry.len(),
            timeout_secs = config.dispatch.timeout_secs,
            max_concurrent = config.dispatch.max_concurrent,
            otlp_export = tracing_guard.otlp_enabled(),
            "Starting alert-relay"
        );
        for (position, target) in registry.iter().enumerate() {
            tracing::info!(position, address = %target.address, "Target registered");
        }

        run(config, registry).await
    })
}

/// `relay.toml`, or a legacy `config.yml` in the working directory when
/// only that exists.
fn default_config_path() -> String {
    let legacy = std::path::Path::new("config.yml");
    if !std::path::Path::new("relay.toml").exists() && legacy.exists() {
        return "config.yml".to_string();
    }
    "relay.toml".to_string()
}

async fn run(config: RelayConfig, registry: relay::target::TargetRegistry) -> anyhow::Result<()> {
    // One pooled client shared by every relay; immutable after construction
    let client = reqwest::Client::builder()
        .timeout(config.dispatch.timeout())
        .connect_timeout(config.dispatch.connect_timeout())
        .build()?;

    let dispatcher = Dispatcher::new(client, config.dispatch.settings());
    let relay = Relay::new(
        registry,
        dispatcher,
        config.server.max_body_bytes,
        RelayStats::new(),
    );

    let state = AppState {
        relay,
        endpoint: config.server.endpoint.clone(),
    };

    server::run(state, &config.server.bind_address()).await
}
