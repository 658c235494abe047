//! Signal Ingest Bridge (spec §4.B).
//! Mission: the sole writer of `signals` rows and the sole appender to
//! the signals stream. Everything downstream trusts that a row exists
//! before its stream entry is read.
//!
//! Grounded on the teacher's websocket-feed reconnect-with-backoff loop
//! and its idempotent-insert idiom for feed rows, adapted here from a
//! websocket feed to a zmq PULL socket (see DESIGN.md).

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::observation::{EventEnvelope, ObservationClient};
use crate::schema::{self, EventType};
use crate::store::models::{Direction, Signal};
use crate::store::Store;
use crate::streams::{signals_stream_key, StreamClient};

/// Connects the PULL socket with exponential backoff, bounded at ~30s
/// (spec §4.B "upstream disconnect triggers reconnect with exponential
/// backoff, bounded at ~30s").
fn connect_pull(addr: &str) -> zmq::Socket {
    let ctx = zmq::Context::new();
    let mut delay = Duration::from_secs(1);
    let max_delay = Duration::from_secs(30);
    loop {
        match ctx.socket(zmq::PULL).and_then(|socket| {
            socket.connect(addr)?;
            socket.set_rcvtimeo(2_000)?;
            Ok(socket)
        }) {
            Ok(socket) => {
                info!(addr, "signal ingest bridge connected to upstream socket");
                return socket;
            }
            Err(e) => {
                warn!(error = %e, delay_secs = delay.as_secs(), "upstream socket connect failed; retrying");
                thread::sleep(delay);
                delay = (delay * 2).min(max_delay);
            }
        }
    }
}

/// How often the main loop re-runs `reconcile`, beyond the one
/// guaranteed to run at startup (spec §4.B "periodic reconciliation
/// pass" — a transient `XADD` failure that does not crash the process
/// must still be caught without waiting for a restart).
const RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Blocking body of the ingest bridge. Run this inside
/// `tokio::task::spawn_blocking` — the zmq recv loop is blocking by
/// nature, and the async store/stream/observation work is driven via
/// the ambient runtime handle so one OS thread is enough.
pub fn run(
    cfg: Config,
    store: Store,
    stream: StreamClient,
    observation: ObservationClient,
    shutdown: impl Fn() -> bool,
) -> Result<()> {
    let handle = tokio::runtime::Handle::current();

    handle
        .block_on(stream.ensure_group(&signals_stream_key(), &cfg.signals_group))
        .context("ensure signals consumer group")?;

    // Crash recovery: a prior instance may have committed a DB row and
    // died before appending its stream entry (spec §4.B).
    reconcile(&store, &stream, &handle)?;

    let socket = connect_pull(&cfg.upstream_socket_addr);
    let mut last_reconcile = Instant::now();

    while !shutdown() {
        if last_reconcile.elapsed() >= RECONCILE_INTERVAL {
            if let Err(e) = reconcile(&store, &stream, &handle) {
                warn!(error = %e, "signal ingest bridge: periodic reconciliation failed");
            }
            last_reconcile = Instant::now();
        }

        let bytes = match socket.recv_bytes(0) {
            Ok(bytes) => bytes,
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                warn!(error = %e, "signal ingest bridge: recv failed");
                continue;
            }
        };

        if let Err(e) = handle.block_on(ingest_one(&bytes, &store, &stream, &observation)) {
            warn!(error = %e, "signal ingest bridge: failed to process payload");
        }
    }

    Ok(())
}

async fn ingest_one(
    bytes: &[u8],
    store: &Store,
    stream: &StreamClient,
    observation: &ObservationClient,
) -> Result<()> {
    let payload: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "signal ingest bridge: malformed JSON payload, dropping");
            return Ok(());
        }
    };

    if let Err(rejection) = schema::validate(EventType::SignalGenerated, &payload) {
        warn!(%rejection, "signal ingest bridge: validation rejected, dropping");
        return Ok(());
    }

    let signal = match parse_signal(&payload) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "signal ingest bridge: could not build signal, dropping");
            return Ok(());
        }
    };

    let is_new = store
        .signals()?
        .repo()
        .insert_if_absent(&signal)
        .context("insert signal")?;

    if !is_new {
        debug!(signal_id = %signal.signal_id, "signal ingest bridge: duplicate, skipping");
        return Ok(());
    }

    append_and_mark(&signal, store, stream).await?;

    observation.publish(
        EventEnvelope::new(
            EventType::SignalGenerated,
            "signal-ingest",
            serde_json::json!({
                "signal_id": signal.signal_id,
                "symbol": signal.symbol,
                "direction": signal.direction.as_str(),
                "entry": signal.entry,
                "sl": signal.sl,
                "tp": signal.tp,
                "confidence": signal.confidence,
                "pattern": signal.pattern,
            }),
        )
        .with_correlation(signal.signal_id.clone()),
    );

    Ok(())
}

async fn append_and_mark(signal: &Signal, store: &Store, stream: &StreamClient) -> Result<()> {
    stream
        .append(
            &signals_stream_key(),
            &[
                ("signal_id", signal.signal_id.as_str()),
                ("symbol", signal.symbol.as_str()),
                ("direction", signal.direction.as_str()),
                ("entry", &signal.entry.to_string()),
                ("sl", &signal.sl.to_string()),
                ("tp", &signal.tp.to_string()),
                ("confidence", &signal.confidence.to_string()),
                ("pattern", signal.pattern.as_str()),
            ],
        )
        .await
        .context("append signal to stream")?;

    store
        .signals()?
        .repo()
        .mark_streamed(&signal.signal_id)
        .context("mark signal streamed")?;

    Ok(())
}

fn parse_signal(payload: &Value) -> Result<Signal> {
    let obj = payload
        .as_object()
        .context("payload is not a JSON object")?;

    let signal_id = obj
        .get("signal_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let symbol = schema::normalize(
        obj.get("symbol")
            .and_then(Value::as_str)
            .context("missing symbol")?,
    );
    let direction = Direction::parse(
        obj.get("direction")
            .and_then(Value::as_str)
            .context("missing direction")?,
    )
    .context("invalid direction")?;

    Ok(Signal {
        signal_id,
        symbol,
        direction,
        entry: obj.get("entry").and_then(Value::as_f64).context("missing entry")?,
        sl: obj.get("sl").and_then(Value::as_f64).context("missing sl")?,
        tp: obj.get("tp").and_then(Value::as_f64).context("missing tp")?,
        confidence: obj
            .get("confidence")
            .and_then(Value::as_f64)
            .context("missing confidence")?,
        pattern: obj
            .get("pattern")
            .and_then(Value::as_str)
            .context("missing pattern")?
            .to_string(),
        created_at: Utc::now(),
    })
}

/// Re-appends any signal row whose stream entry never made it out before
/// a prior crash (spec §4.B "restart must detect and append missing
/// entries (periodic reconciliation pass)").
fn reconcile(store: &Store, stream: &StreamClient, handle: &tokio::runtime::Handle) -> Result<()> {
    let pending = store
        .signals()?
        .repo()
        .list_unstreamed()
        .context("list unstreamed signals")?;

    if pending.is_empty() {
        return Ok(());
    }

    info!(count = pending.len(), "signal ingest bridge: reconciling unstreamed signals");
    for signal in pending {
        handle.block_on(append_and_mark(&signal, store, stream))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signal_with_explicit_id() {
        let payload = serde_json::json!({
            "signal_id": "EG-42",
            "symbol": "eurusd",
            "direction": "BUY",
            "entry": 1.085, "sl": 1.083, "tp": 1.089,
            "confidence": 87.5,
            "pattern": "LIQUIDITY_SWEEP_REVERSAL",
        });
        let signal = parse_signal(&payload).unwrap();
        assert_eq!(signal.signal_id, "EG-42");
        assert_eq!(signal.symbol, "EURUSD");
        assert_eq!(signal.direction, Direction::Buy);
    }

    #[test]
    fn assigns_signal_id_when_absent() {
        let payload = serde_json::json!({
            "symbol": "GBPUSD",
            "direction": "SELL",
            "entry": 1.27, "sl": 1.275, "tp": 1.26,
            "confidence": 60.0,
            "pattern": "X",
        });
        let signal = parse_signal(&payload).unwrap();
        assert!(!signal.signal_id.is_empty());
    }

    #[test]
    fn rejects_missing_required_field() {
        let payload = serde_json::json!({
            "symbol": "GBPUSD",
            "direction": "SELL",
            "sl": 1.275, "tp": 1.26,
            "confidence": 60.0,
            "pattern": "X",
        });
        assert!(parse_signal(&payload).is_err());
    }
}
