//! Event Observation Bus (spec §4.H).
//! Mission: a single, append-only analytics surface every other
//! component pushes lifecycle events into — signal generation, fire
//! commands, trade confirmations, EA heartbeats, operator actions —
//! without ever being able to stall the trading path doing it.

pub mod broker;
pub mod client;
pub mod collector;
pub mod events;

pub use client::ObservationClient;
pub use events::EventEnvelope;
