//! Confirmation Listener (spec §4.G).

mod listener;

pub use listener::run;
