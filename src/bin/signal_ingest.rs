//! Thin entry point for the Signal Ingest Bridge (spec §4.B).

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signalfire_core::config::Config;
use signalfire_core::observation::ObservationClient;
use signalfire_core::store::Store;
use signalfire_core::streams::StreamClient;
use signalfire_core::{ingest, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env().context("load configuration")?;
    let store = Store::new(&cfg.database_path).context("open state store")?;
    let stream = StreamClient::connect(&cfg.redis_url, cfg.stream_max_len)
        .await
        .context("connect to redis stream backend")?;
    let observation = ObservationClient::connect(&cfg.observation_pull_addr);

    let shutdown_flag = shutdown::install();
    let task_flag = shutdown_flag.clone();

    tokio::task::spawn_blocking(move || {
        ingest::run(cfg, store, stream, observation, move || {
            shutdown::is_set(&task_flag)
        })
    })
    .await
    .context("signal ingest bridge task panicked")??;

    Ok(())
}
