//! Subscribes to every event on the observation bus and persists a
//! normalized row per event (spec §4.H). Runs as its own process
//! (`observation-collector`) so a slow or crashed collector never
//! backs up the broker or any producer.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::schema;
use crate::store::models::ObservedEvent;
use crate::store::Store;

use super::events::EventEnvelope;

pub fn run(pub_addr: &str, store: &Store, shutdown: impl Fn() -> bool) -> Result<()> {
    let ctx = zmq::Context::new();
    let sub = ctx.socket(zmq::SUB).context("create SUB socket")?;
    sub.connect(pub_addr).context("connect SUB socket")?;
    sub.set_subscribe(b"").context("subscribe to all events")?;
    sub.set_rcvtimeo(5_000).ok();

    while !shutdown() {
        let bytes = match sub.recv_bytes(0) {
            Ok(bytes) => bytes,
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                warn!(error = %e, "observation collector: recv failed");
                continue;
            }
        };

        let envelope: EventEnvelope = match serde_json::from_slice(&bytes) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "observation collector: malformed envelope, dropping");
                continue;
            }
        };

        if let Err(rejection) = schema::validate(envelope.event_type, &envelope.data) {
            warn!(%rejection, event_id = %envelope.event_id, "observation collector: schema rejected");
            continue;
        }

        let event = ObservedEvent {
            event_id: envelope.event_id.clone(),
            event_type: envelope.event_type,
            timestamp: envelope.timestamp,
            source: envelope.source.clone(),
            correlation_id: envelope.correlation_id.clone(),
            user_id: envelope.user_id.clone(),
            data: envelope.data.clone(),
        };

        match store.events().and_then(|handle| handle.repo().insert(&event)) {
            Ok(()) => debug!(event_id = %envelope.event_id, "observation collector: persisted"),
            Err(e) => warn!(error = %e, event_id = %envelope.event_id, "observation collector: persist failed"),
        }
    }

    Ok(())
}
