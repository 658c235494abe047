//! Thin entry point for the Event Observation Bus broker half (spec
//! §4.H) — relays producer PUSH traffic onto the subscriber-facing PUB
//! socket.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signalfire_core::config::Config;
use signalfire_core::observation::broker;
use signalfire_core::shutdown;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env().context("load configuration")?;
    let shutdown_flag = shutdown::install();
    let task_flag = shutdown_flag.clone();

    let pull_addr = cfg.observation_pull_addr.clone();
    let pub_addr = cfg.observation_pub_addr.clone();

    tokio::task::spawn_blocking(move || broker::run(&pull_addr, &pub_addr, move || shutdown::is_set(&task_flag)))
        .await
        .context("observation broker task panicked")??;

    Ok(())
}
