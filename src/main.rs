use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenv::dotenv;
use pingora::prelude::Opt;
use pingora::proxy::http_proxy_service;
use pingora::server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

use causeway::cache::DiskCache;
use causeway::config::{loader, ConfigSnapshot, ConfigStore};
use causeway::metrics::MetricsCollector;
use causeway::proxy::GatewayEngine;
use causeway::resolver::HeadProber;
use causeway::security::{SecurityGate, SecurityGateConfig};

const DEFAULT_PORT: &str = "3336";

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .json()
        .init();
}

fn load_initial_snapshot(data_dir: &PathBuf) -> ConfigSnapshot {
    let config_path = data_dir.join("config.json");
    match loader::load_snapshot_from_file(&config_path) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::warn!(%err, path = %config_path.display(), "no usable local config, starting empty");
            ConfigSnapshot::empty()
        }
    }
}

fn main() {
    dotenv().ok();

    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    init_logging(&log_level);

    let port = env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
    let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()));
    let _admin_token = env::var("ADMIN_TOKEN").ok();
    let _sync_endpoint = env::var("SYNC_ENDPOINT").ok();
    let _sync_token = env::var("SYNC_TOKEN").ok();
    if let Ok(favicon) = env::var("FAVICON_SOURCE_URL") {
        info!(favicon, "favicon source configured");
    }

    let opt = Opt::parse_args();
    let mut server = Server::new(Some(opt)).expect("failed to construct pingora server");
    server.bootstrap();

    let initial_snapshot = load_initial_snapshot(&data_dir);
    let config_store = ConfigStore::new(initial_snapshot);
    config_store.on_change(|snapshot| {
        info!(rules = snapshot.rules.len(), "config store reloaded");
    });

    let metrics = MetricsCollector::new();
    let security = SecurityGate::new(SecurityGateConfig::default());
    let prober = Box::new(HeadProber::new(Duration::from_millis(1_500)));
    let cache = DiskCache::new(data_dir.clone());

    let engine = GatewayEngine::new(config_store, metrics, security, prober, cache);

    let address = format!("0.0.0.0:{port}");
    let mut proxy_service = http_proxy_service(&server.configuration, engine);
    proxy_service.add_tcp(&address);
    server.add_service(proxy_service);

    info!(address, "gateway listening");
    server.run_forever();
}
