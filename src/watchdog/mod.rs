//! Watchdogs & Pager (spec §4.I).

mod checks;
mod pager;

pub use checks::{run_tick, WatchdogState, TICK_INTERVAL};
pub use pager::Pager;

use anyhow::Result;

use crate::config::Config;
use crate::store::Store;
use crate::streams::StreamClient;

pub async fn run(cfg: &Config, store: &Store, stream: &StreamClient, shutdown: impl Fn() -> bool) -> Result<()> {
    let pager = Pager::new(cfg.pager_webhook_url.clone(), cfg.pager_log_path.clone());
    let mut state = WatchdogState::default();

    while !shutdown() {
        run_tick(cfg, store, stream, &pager, &mut state).await?;
        tokio::time::sleep(TICK_INTERVAL).await;
    }

    Ok(())
}
