//! Observation bus broker: PULL-to-PUB relay.
//! Mission: strictly single-producer-many-subscribers per socket; no
//! component both binds and connects the same socket (spec §5).

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Runs until `shutdown` is set. Blocking by nature (zmq has no native
/// async integration in this stack) — callers run this inside
/// `tokio::task::spawn_blocking` or a dedicated OS thread.
pub fn run(pull_addr: &str, pub_addr: &str, shutdown: impl Fn() -> bool) -> Result<()> {
    let ctx = zmq::Context::new();

    let pull = ctx.socket(zmq::PULL).context("create PULL socket")?;
    pull.bind(pull_addr).context("bind PULL socket")?;
    pull.set_rcvtimeo(5_000).ok();

    let publisher = ctx.socket(zmq::PUB).context("create PUB socket")?;
    publisher.bind(pub_addr).context("bind PUB socket")?;

    info!(pull_addr, pub_addr, "observation broker listening");

    while !shutdown() {
        match pull.recv_bytes(0) {
            Ok(bytes) => {
                if let Err(e) = publisher.send(bytes, 0) {
                    warn!(error = %e, "observation broker: publish failed");
                }
            }
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                warn!(error = %e, "observation broker: recv failed");
            }
        }
    }

    info!("observation broker shutting down");
    Ok(())
}
