//! Thin entry point for Watchdogs & Pager (spec §4.I).

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signalfire_core::config::Config;
use signalfire_core::shutdown;
use signalfire_core::store::Store;
use signalfire_core::streams::StreamClient;
use signalfire_core::watchdog;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env().context("load configuration")?;

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], cfg.metrics_port))
        .install()
        .context("install prometheus exporter")?;
    info!(port = cfg.metrics_port, "watchdog metrics exporter listening");

    let store = Store::new(&cfg.database_path).context("open state store")?;
    let stream = StreamClient::connect(&cfg.redis_url, cfg.stream_max_len)
        .await
        .context("connect to redis stream backend")?;

    let shutdown_flag = shutdown::install();

    watchdog::run(&cfg, &store, &stream, || shutdown::is_set(&shutdown_flag))
        .await
        .context("watchdog exited")?;

    Ok(())
}
