//! Durable stream abstraction over Redis Streams, backing the signals
//! stream and every per-EA fire stream (spec §6).

mod client;
mod dead_letter;

pub use client::{PendingSummary, StreamClient, StreamEntry};
pub use dead_letter::DeadLetter;

/// Key for the single signals stream (spec §6).
pub fn signals_stream_key() -> String {
    "signals".to_string()
}

/// Key for a per-EA fire stream (spec §6 "`fire.{target_uuid}`").
pub fn fire_stream_key(target_uuid: &str) -> String {
    format!("fire.{target_uuid}")
}
