//! Signal Delivery Worker (spec §4.C).
//! Mission: the sole consumer that turns a durable signal entry into a
//! materialized mission at the mission endpoint, at-most-once per
//! `signal_id` via the `Idempotency-Key` header.

use std::collections::HashMap as StdHashMap;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use reqwest::Client;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Outcome;
use crate::streams::{signals_stream_key, DeadLetter, StreamClient, StreamEntry};

/// After this many claim-and-redeliver cycles a still-failing entry is
/// poisoned and moved to the dead-letter stream (spec §7 "Poisoned").
const MAX_REDELIVERY_ATTEMPTS: u32 = 5;

pub fn http_client() -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(10))
        .build()?)
}

/// Runs the delivery loop until `shutdown` returns true. `group` and
/// `consumer` let the legacy relay (component D) reuse this same loop
/// against a different consumer group on the same stream.
pub async fn run(
    cfg: &Config,
    stream: &StreamClient,
    client: &Client,
    group: &str,
    consumer: &str,
    shutdown: impl Fn() -> bool,
) -> Result<()> {
    stream.ensure_group(&signals_stream_key(), group).await?;
    let mut attempts: StdHashMap<String, u32> = StdHashMap::new();

    while !shutdown() {
        let entries = stream
            .read_group(&signals_stream_key(), group, consumer, 10, Duration::from_secs(5))
            .await?;

        for entry in &entries {
            match deliver(entry, client, &cfg.mission_endpoint).await {
                Outcome::Delivered => {
                    stream.ack(&signals_stream_key(), group, &entry.id).await?;
                    attempts.remove(&entry.id);
                }
                Outcome::Rejected { reason } => {
                    warn!(entry_id = %entry.id, reason, "signal delivery: rejected, acking");
                    stream.ack(&signals_stream_key(), group, &entry.id).await?;
                    attempts.remove(&entry.id);
                }
                Outcome::Retried { after } => {
                    let count = attempts.entry(entry.id.clone()).or_insert(0);
                    *count += 1;
                    warn!(entry_id = %entry.id, attempt = *count, backoff_ms = after.as_millis() as u64, "signal delivery: transient failure");
                }
                Outcome::DeadLettered { .. } => unreachable!("deliver() never returns DeadLettered directly"),
            }
        }

        reclaim_stale(cfg, stream, group, consumer, &mut attempts).await?;
    }

    Ok(())
}

/// Thin wrapper for the legacy relay (component D), which only needs a
/// delivered/not-delivered signal for its comparison metric and does not
/// participate in the primary worker's dead-letter bookkeeping.
pub async fn deliver_for_comparison(entry: &StreamEntry, client: &Client, mission_endpoint: &str) -> bool {
    matches!(deliver(entry, client, mission_endpoint).await, Outcome::Delivered)
}

/// Attempts a single delivery with the 5x exponential-backoff-plus-
/// full-jitter retry budget spec §5 assigns to the mission endpoint.
async fn deliver(entry: &StreamEntry, client: &Client, mission_endpoint: &str) -> Outcome {
    let signal_id = match entry.fields.get("signal_id") {
        Some(id) => id.clone(),
        None => {
            return Outcome::Rejected {
                reason: "entry missing signal_id field".to_string(),
            }
        }
    };

    let body = serde_json::to_value(&entry.fields).unwrap_or_default();

    let mut delay = Duration::from_millis(250);
    for attempt in 0..5 {
        let result = client
            .post(mission_endpoint)
            .header("Idempotency-Key", &signal_id)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => return Outcome::Delivered,
            Ok(resp) => {
                warn!(signal_id, status = %resp.status(), attempt, "mission endpoint returned non-2xx");
            }
            Err(e) => {
                warn!(signal_id, error = %e, attempt, "mission endpoint call failed");
            }
        }

        if attempt < 4 {
            let jitter: u64 = rand::thread_rng().gen_range(0..=delay.as_millis() as u64);
            tokio::time::sleep(Duration::from_millis(jitter)).await;
            delay = (delay * 2).min(Duration::from_secs(10));
        }
    }

    Outcome::Retried { after: delay }
}

/// Periodic `XPENDING`/`XAUTOCLAIM` scan: entries idle past the stuck
/// threshold are claimed back by this consumer and, past
/// [`MAX_REDELIVERY_ATTEMPTS`], dead-lettered (spec §4.C, §7 "Poisoned").
async fn reclaim_stale(
    cfg: &Config,
    stream: &StreamClient,
    group: &str,
    consumer: &str,
    attempts: &mut StdHashMap<String, u32>,
) -> Result<()> {
    let summary = stream.pending_summary(&signals_stream_key(), group).await?;
    if summary.count == 0 {
        return Ok(());
    }

    let stale = stream
        .claim_stale(
            &signals_stream_key(),
            group,
            consumer,
            cfg.stuck_fire_threshold,
            50,
        )
        .await?;

    for entry in stale {
        let count = *attempts.get(&entry.id).unwrap_or(&0);
        if count >= MAX_REDELIVERY_ATTEMPTS {
            let dead_letter = DeadLetter::new(stream);
            let payload = serde_json::to_string(&entry.fields).unwrap_or_default();
            dead_letter
                .move_entry(
                    &signals_stream_key(),
                    &entry.id,
                    &payload,
                    "redelivery budget exhausted",
                    count,
                )
                .await?;
            stream.ack(&signals_stream_key(), group, &entry.id).await?;
            attempts.remove(&entry.id);
            info!(entry_id = %entry.id, "signal delivery: dead-lettered poisoned entry");
        }
    }

    Ok(())
}
