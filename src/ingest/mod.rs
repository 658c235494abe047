//! Signal Ingest Bridge (spec §4.B).

mod bridge;

pub use bridge::run;
