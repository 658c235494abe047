//! Thin entry point for the Event Observation Bus collector half (spec
//! §4.H) — the durable subscriber that persists every observed event.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signalfire_core::config::Config;
use signalfire_core::observation::collector;
use signalfire_core::shutdown;
use signalfire_core::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env().context("load configuration")?;
    let store = Store::new(&cfg.database_path).context("open state store")?;

    let shutdown_flag = shutdown::install();
    let task_flag = shutdown_flag.clone();
    let pub_addr = cfg.observation_pub_addr.clone();

    tokio::task::spawn_blocking(move || collector::run(&pub_addr, &store, move || shutdown::is_set(&task_flag)))
        .await
        .context("observation collector task panicked")??;

    Ok(())
}
