//! Fire Dispatch Bridge (spec §4.F).
//! Mission: the single consumer that turns a queued fire stream entry
//! into an EA IPC write, one dedicated consumer per `target_uuid` so
//! dispatch order for a given EA always matches stream order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::Config;
use crate::ea_ipc::{EaIpc, FireInstruction};
use crate::store::models::{Direction, FireStatus};
use crate::store::Store;
use crate::streams::{fire_stream_key, StreamClient};

/// Discovers known EAs and keeps one dispatch task alive per
/// `target_uuid` (spec §4.F "bridge may run multiple workers per
/// stream, but fires for the same EA must be dispatched in stream
/// order — enforced by a single consumer per group per EA").
pub async fn run(
    cfg: Arc<Config>,
    store: Store,
    stream: StreamClient,
    ea_ipc: Arc<EaIpc>,
    shutdown: Arc<dyn Fn() -> bool + Send + Sync>,
) -> Result<()> {
    let known: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

    loop {
        if shutdown() {
            break;
        }

        let targets = store.ea_instances()?.repo().list_all().unwrap_or_default();
        let mut known_guard = known.lock().await;
        for ea in targets {
            if known_guard.insert(ea.target_uuid.clone()) {
                info!(target_uuid = %ea.target_uuid, "fire dispatch bridge: starting consumer");
                let cfg = cfg.clone();
                let store = store.clone();
                let stream = stream.clone();
                let ea_ipc = ea_ipc.clone();
                let shutdown = shutdown.clone();
                let target_uuid = ea.target_uuid.clone();
                tokio::spawn(async move {
                    if let Err(e) =
                        dispatch_one_ea(cfg, store, stream, ea_ipc, target_uuid.clone(), shutdown).await
                    {
                        warn!(error = %e, target_uuid, "fire dispatch bridge: consumer exited");
                    }
                });
            }
        }
        drop(known_guard);

        sleep(Duration::from_secs(5)).await;
    }

    Ok(())
}

async fn dispatch_one_ea(
    cfg: Arc<Config>,
    store: Store,
    stream: StreamClient,
    ea_ipc: Arc<EaIpc>,
    target_uuid: String,
    shutdown: Arc<dyn Fn() -> bool + Send + Sync>,
) -> Result<()> {
    let stream_key = fire_stream_key(&target_uuid);
    stream.ensure_group(&stream_key, &cfg.fire_group).await?;
    let consumer = format!("dispatch-{target_uuid}");

    while !shutdown() {
        let entries = stream
            .read_group(&stream_key, &cfg.fire_group, &consumer, 10, Duration::from_secs(5))
            .await?;

        for entry in &entries {
            let fire_id = entry.fields.get("fire_id").cloned().unwrap_or_default();
            if fire_id.is_empty() {
                stream.ack(&stream_key, &cfg.fire_group, &entry.id).await?;
                continue;
            }

            if entry.fields.get("dry_run").map(String::as_str) == Some("true") {
                stream.ack(&stream_key, &cfg.fire_group, &entry.id).await?;
                continue;
            }

            if cfg.flags.is_shadow() {
                // Bridge is log-only in shadow mode: the router already
                // wrote the EA IPC file directly (spec §4.E mode table).
                info!(fire_id, target_uuid, "fire dispatch bridge: shadow mode, log-only");
                stream.ack(&stream_key, &cfg.fire_group, &entry.id).await?;
                continue;
            }

            let ea = store.ea_instances()?.repo().get(&target_uuid)?;
            let stale_too_long = ea
                .as_ref()
                .map(|ea| !ea.is_fresh(Utc::now(), cfg.ea_unreachable_threshold))
                .unwrap_or(true);

            if stale_too_long {
                warn!(fire_id, target_uuid, "fire dispatch bridge: EA unreachable, rejecting");
                store
                    .fires()?
                    .repo()
                    .set_status(&fire_id, FireStatus::Rejected, Utc::now())?;
                stream.ack(&stream_key, &cfg.fire_group, &entry.id).await?;
                continue;
            }

            let instruction = FireInstruction {
                fire_id: fire_id.clone(),
                symbol: entry.fields.get("symbol").cloned().unwrap_or_default(),
                direction: Direction::parse(entry.fields.get("direction").map(String::as_str).unwrap_or(""))
                    .unwrap_or(Direction::Buy),
                lot: entry.fields.get("lot").and_then(|v| v.parse().ok()).unwrap_or(0.0),
                price: 0.0,
                tp: entry.fields.get("tp").and_then(|v| v.parse().ok()).unwrap_or(0.0),
                sl: entry.fields.get("sl").and_then(|v| v.parse().ok()).unwrap_or(0.0),
                comment: entry.fields.get("comment").filter(|s| !s.is_empty()).cloned(),
            };

            match ea_ipc.write_fire(&target_uuid, &instruction) {
                Ok(()) => {
                    store
                        .fires()?
                        .repo()
                        .set_status(&fire_id, FireStatus::Routed, Utc::now())?;
                    stream.ack(&stream_key, &cfg.fire_group, &entry.id).await?;
                }
                Err(e) => {
                    warn!(error = %e, fire_id, target_uuid, "fire dispatch bridge: IPC write failed, retrying");
                }
            }
        }
    }

    Ok(())
}
