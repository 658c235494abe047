//! Confirmation Listener (spec §4.G).
//! Mission: the only writer of fill/reject state onto a `Fire`, and the
//! bridge from broker-side execution back onto the observation bus.
//!
//! The inbound channel is the EA IPC directory's `.confirmation` files
//! (spec §6 "a pull socket (or file watcher)") — polled rather than
//! event-driven, since the EA side only ever writes a file and this
//! system has no other live channel to it.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::ea_ipc::EaIpc;
use crate::observation::{EventEnvelope, ObservationClient};
use crate::schema::EventType;
use crate::store::models::{Confirmation, ConfirmationStatus, FireStatus};
use crate::store::Store;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run(
    ea_ipc: &EaIpc,
    store: &Store,
    observation: &ObservationClient,
    shutdown: impl Fn() -> bool,
) -> Result<()> {
    while !shutdown() {
        let found = ea_ipc.scan_confirmations()?;
        for (fire_id, file) in found {
            if let Err(e) = process(&fire_id, &file, store, observation) {
                warn!(error = %e, fire_id, "confirmation listener: failed to process confirmation");
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    Ok(())
}

fn process(
    fire_id: &str,
    file: &crate::ea_ipc::ConfirmationFile,
    store: &Store,
    observation: &ObservationClient,
) -> Result<()> {
    let fires_repo = store.fires()?;
    let fire = match fires_repo.repo().get(fire_id)? {
        Some(fire) => fire,
        None => {
            warn!(fire_id, "confirmation listener: unknown fire_id, discarding");
            return Ok(());
        }
    };

    let confirmations_repo = store.confirmations()?;
    if confirmations_repo.repo().has_final_fill(fire_id)? {
        warn!(
            fire_id,
            "confirmation listener: confirmation arrived after final fill, discarding"
        );
        return Ok(());
    }

    let sequence = confirmations_repo.repo().list_for_fire(fire_id)?.len() as i64;
    let status = ConfirmationStatus::parse(&file.status).unwrap_or(ConfirmationStatus::Partial);

    let confirmation = Confirmation {
        fire_id: fire_id.to_string(),
        sequence,
        ticket: file.ticket.clone(),
        fill_price: file.price,
        fill_volume: fire.lot,
        status,
        broker_ts: Utc::now(),
    };

    let is_new = confirmations_repo.repo().insert_if_absent(&confirmation)?;
    if !is_new {
        return Ok(());
    }

    let now = Utc::now();
    fires_repo.repo().set_ticket(fire_id, &file.ticket, now)?;

    match status {
        ConfirmationStatus::Filled => {
            fires_repo.repo().set_status(fire_id, FireStatus::Filled, now)?;
        }
        ConfirmationStatus::Rejected => {
            fires_repo.repo().set_status(fire_id, FireStatus::Rejected, now)?;
        }
        ConfirmationStatus::Partial => {
            // Leaves status at ROUTED until a final fill arrives (spec §4.G).
        }
    }

    let correlation_id = fire.signal_id.clone().unwrap_or_else(|| fire_id.to_string());
    observation.publish(
        EventEnvelope::new(
            EventType::TradeExecuted,
            "confirmation-listener",
            serde_json::json!({
                "fire_id": fire_id,
                "status": status.as_str(),
                "ticket": file.ticket,
                "price": file.price,
            }),
        )
        .with_correlation(correlation_id)
        .with_user(fire.user_id.clone()),
    );

    info!(fire_id, status = status.as_str(), "confirmation listener: recorded confirmation");
    Ok(())
}
