//! Signal Delivery Worker (spec §4.C).

mod worker;

pub use worker::{deliver_for_comparison, http_client, run};
