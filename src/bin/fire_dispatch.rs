//! Thin entry point for the Fire Dispatch Bridge (spec §4.F).

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signalfire_core::config::Config;
use signalfire_core::ea_ipc::EaIpc;
use signalfire_core::fire::dispatch;
use signalfire_core::shutdown;
use signalfire_core::store::Store;
use signalfire_core::streams::StreamClient;

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
    let ea_ipc = Arc::new(EaIpc::new(&cfg.ea_ipc_dir));

    let shutdown_flag = shutdown::install();
    let shutdown_fn: Arc<dyn Fn() -> bool + Send + Sync> =
        Arc::new(move || shutdown::is_set(&shutdown_flag));

    dispatch::run(Arc::new(cfg), store, stream, ea_ipc, shutdown_fn)
        .await
        .context("fire dispatch bridge exited")?;

    Ok(())
}
