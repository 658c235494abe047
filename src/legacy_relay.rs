//! Legacy Relay, dual-run (spec §4.D).
//! Mission: during cutover, duplicate signal delivery on an independent
//! consumer group so both paths race to materialize the same mission —
//! the endpoint's `Idempotency-Key` enforcement makes the race harmless.
//! Removable by stopping this one process; nothing else depends on it.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use metrics::{counter, gauge};
use reqwest::Client;
use tracing::info;

use crate::config::Config;
use crate::streams::{signals_stream_key, StreamClient};

/// Separate consumer group so the legacy relay's acks never interfere
/// with the primary delivery worker's `relay` group.
pub const LEGACY_GROUP: &str = "legacy-relay";

pub async fn run(
    cfg: &Config,
    stream: &StreamClient,
    client: &Client,
    consumer: &str,
    shutdown: impl Fn() -> bool,
) -> Result<()> {
    stream.ensure_group(&signals_stream_key(), LEGACY_GROUP).await?;
    info!("legacy relay running alongside primary delivery worker");

    while !shutdown() {
        let entries = stream
            .read_group(
                &signals_stream_key(),
                LEGACY_GROUP,
                consumer,
                10,
                Duration::from_secs(5),
            )
            .await?;

        for entry in &entries {
            let outcome = crate::delivery::deliver_for_comparison(entry, client, &cfg.mission_endpoint).await;
            if outcome {
                counter!("legacy_relay_delivered_total").increment(1);
                stream.ack(&signals_stream_key(), LEGACY_GROUP, &entry.id).await?;
            } else {
                counter!("legacy_relay_failed_total").increment(1);
            }

            if let Some(ts) = entry_timestamp_ms(&entry.id) {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis() as u64;
                gauge!("legacy_relay_lag_ms").set((now.saturating_sub(ts)) as f64);
            }
        }
    }

    Ok(())
}

/// Redis stream IDs are `<millis>-<seq>`; the millis component gives a
/// cheap lag measurement for the cutover comparison metric (spec §4.D
/// "side-by-side comparison metric (count, lag)").
fn entry_timestamp_ms(entry_id: &str) -> Option<u64> {
    entry_id.split('-').next()?.parse().ok()
}
