//! Fire Command Router (spec §4.E) and Fire Dispatch Bridge (spec §4.F).

pub mod dispatch;
mod idempotency;
mod router;

pub use router::{submit_fire, FireRejected, FireRequest, FireResponse};
