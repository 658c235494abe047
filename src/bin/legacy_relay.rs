//! Thin entry point for the Legacy Relay (spec §4.D).

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use signalfire_core::config::Config;
use signalfire_core::delivery;
use signalfire_core::legacy_relay;
use signalfire_core::shutdown;
use signalfire_core::streams::StreamClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env().context("load configuration")?;

    // Separate port from the watchdog's exporter so both can run on one host
    // during dual-run; the operator compares the two paths' counters (spec
    // §4.D "side-by-side comparison metric").
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], cfg.metrics_port + 1))
        .install()
        .context("install prometheus exporter")?;
    info!(port = cfg.metrics_port + 1, "legacy relay metrics exporter listening");

    let stream = StreamClient::connect(&cfg.redis_url, cfg.stream_max_len)
        .await
        .context("connect to redis stream backend")?;
    let client = delivery::http_client().context("build mission endpoint http client")?;
    let consumer = format!("legacy-relay-{}", Uuid::new_v4());

    let shutdown_flag = shutdown::install();

    legacy_relay::run(&cfg, &stream, &client, &consumer, || shutdown::is_set(&shutdown_flag))
        .await
        .context("legacy relay exited")?;

    Ok(())
}
