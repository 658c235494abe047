//! Thin entry point for the Signal Delivery Worker (spec §4.C).

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use signalfire_core::config::Config;
use signalfire_core::delivery;
use signalfire_core::shutdown;
use signalfire_core::streams::StreamClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env().context("load configuration")?;
    let stream = StreamClient::connect(&cfg.redis_url, cfg.stream_max_len)
        .await
        .context("connect to redis stream backend")?;
    let client = delivery::http_client().context("build mission endpoint http client")?;
    let consumer = format!("delivery-{}", Uuid::new_v4());

    let shutdown_flag = shutdown::install();

    delivery::run(&cfg, &stream, &client, &cfg.signals_group, &consumer, || {
        shutdown::is_set(&shutdown_flag)
    })
    .await
    .context("signal delivery worker exited")?;

    Ok(())
}
