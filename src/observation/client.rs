//! Fire-and-forget observation bus client.
//! Mission: every other component publishes lifecycle events here without
//! ever letting a publish failure affect the trading path (spec §4.H,
//! §7 "Observation-bus failures are always swallowed").

use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::thread;

use tracing::{debug, warn};

use super::events::EventEnvelope;

/// A PUSH-socket client backed by a dedicated OS thread so that `publish`
/// is always non-blocking from the caller's point of view.
#[derive(Clone)]
pub struct ObservationClient {
    tx: SyncSender<EventEnvelope>,
}

impl ObservationClient {
    pub fn connect(pull_addr: &str) -> Self {
        let (tx, rx) = sync_channel::<EventEnvelope>(4096);
        let addr = pull_addr.to_string();

        thread::spawn(move || {
            let ctx = zmq::Context::new();
            let socket = match ctx.socket(zmq::PUSH) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "observation bus: failed to create PUSH socket");
                    return;
                }
            };
            if let Err(e) = socket.connect(&addr) {
                warn!(error = %e, addr, "observation bus: failed to connect PUSH socket");
                return;
            }

            for envelope in rx.iter() {
                let payload = match serde_json::to_vec(&envelope) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "observation bus: failed to serialize event");
                        continue;
                    }
                };
                if let Err(e) = socket.send(payload, 0) {
                    // Swallowed by design — the trading path must never
                    // see an observation-bus failure.
                    debug!(error = %e, "observation bus: send failed, dropping event");
                }
            }
        });

        Self { tx }
    }

    /// Never blocks and never returns an error the caller must handle —
    /// a full channel or a disconnected publisher thread just drops the
    /// event.
    pub fn publish(&self, envelope: EventEnvelope) {
        match self.tx.try_send(envelope) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!("observation bus: backlog full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("observation bus: publisher thread gone, dropping event");
            }
        }
    }
}
