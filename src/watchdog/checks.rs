//! Periodic health checks (spec §4.I).
//! Mission: a single 30s tick that can see everything a human operator
//! would otherwise have to grep logs for.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use metrics::gauge;
use tracing::warn;

use crate::config::Config;
use crate::store::Store;
use crate::streams::{signals_stream_key, StreamClient};

use super::pager::Pager;

pub const TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Tracks pending-count history across ticks so the "consumer idle"
/// check (no actual consumer-level idle metric is exposed by this
/// Redis Streams wrapper) can approximate idleness as "pending count
/// hasn't moved for longer than the idle threshold".
#[derive(Default)]
pub struct WatchdogState {
    last_pending: HashMap<String, (u64, std::time::Instant)>,
}

pub async fn run_tick(
    cfg: &Config,
    store: &Store,
    stream: &StreamClient,
    pager: &Pager,
    state: &mut WatchdogState,
) -> Result<()> {
    check_ea_freshness(cfg, store, pager).await?;
    check_stuck_fires(cfg, store, pager).await?;
    check_stream_lag(cfg, stream, pager, state).await?;
    check_backup_recency(cfg, pager).await;
    Ok(())
}

async fn check_ea_freshness(cfg: &Config, store: &Store, pager: &Pager) -> Result<()> {
    let now = Utc::now();
    let stale = store.ea_instances()?.repo().list_stale(now, cfg.ea_freshness)?;
    gauge!("watchdog_stale_ea_count").set(stale.len() as f64);
    for ea in stale {
        let message = format!(
            "EA {} (user {}) stale: last seen {}s ago",
            ea.target_uuid,
            ea.user_id,
            ea.age(now).num_seconds()
        );
        warn!("🛑 {message}");
        pager.alert(&message).await;
    }
    Ok(())
}

async fn check_stuck_fires(cfg: &Config, store: &Store, pager: &Pager) -> Result<()> {
    let now = Utc::now();
    let fires = store.fires()?.repo().list_non_terminal()?;
    let mut stuck_count = 0u64;
    for fire in fires {
        let age = now - fire.updated_at;
        if age > chrono::Duration::from_std(cfg.stuck_fire_threshold).unwrap_or_default() {
            stuck_count += 1;
            let message = format!(
                "fire {} for user {} stuck in {:?} for {}s",
                fire.fire_id,
                fire.user_id,
                fire.status,
                age.num_seconds()
            );
            warn!("🛑 {message}");
            pager.alert(&message).await;
        }
    }
    gauge!("watchdog_stuck_fire_count").set(stuck_count as f64);
    Ok(())
}

async fn check_stream_lag(
    cfg: &Config,
    stream: &StreamClient,
    pager: &Pager,
    state: &mut WatchdogState,
) -> Result<()> {
    let key = signals_stream_key();
    let len = stream.len(&key).await?;
    gauge!("watchdog_signals_stream_len").set(len as f64);
    if len > cfg.stream_lag_len_threshold {
        let message = format!("signals stream length {len} exceeds threshold {}", cfg.stream_lag_len_threshold);
        warn!("🛑 {message}");
        pager.alert(&message).await;
    }

    let pending = stream.pending_summary(&key, &cfg.signals_group).await?.count;
    gauge!("watchdog_signals_stream_pending").set(pending as f64);
    let now = std::time::Instant::now();
    let idle_since = match state.last_pending.get(&key) {
        Some((last_count, since)) if *last_count == pending && pending > 0 => *since,
        _ => now,
    };
    let idle = now.duration_since(idle_since);
    state.last_pending.insert(key.clone(), (pending, idle_since));

    if idle > cfg.stream_idle_threshold {
        let message = format!("signals stream consumer idle for {}s", idle.as_secs());
        warn!("🛑 {message}");
        pager.alert(&message).await;
    }

    Ok(())
}

async fn check_backup_recency(cfg: &Config, pager: &Pager) {
    let age = std::fs::metadata(&cfg.backup_path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok());

    match age {
        Some(age) if age > cfg.backup_recency_threshold => {
            let message = format!("most recent backup is {}h old", age.as_secs() / 3600);
            warn!("✅ {message}");
            pager.alert(&message).await;
        }
        None => {
            let message = format!("no backup found at {}", cfg.backup_path);
            warn!("✅ {message}");
            pager.alert(&message).await;
        }
        _ => {}
    }
}
