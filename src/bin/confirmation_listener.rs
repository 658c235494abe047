//! Thin entry point for the Confirmation Listener (spec §4.G).

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signalfire_core::config::Config;
use signalfire_core::confirmation;
use signalfire_core::ea_ipc::EaIpc;
use signalfire_core::observation::ObservationClient;
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
    let observation = ObservationClient::connect(&cfg.observation_pull_addr);
    let ea_ipc = EaIpc::new(&cfg.ea_ipc_dir);

    let shutdown_flag = shutdown::install();

    confirmation::run(&ea_ipc, &store, &observation, || shutdown::is_set(&shutdown_flag))
        .await
        .context("confirmation listener exited")?;

    Ok(())
}
