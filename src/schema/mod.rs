//! Schema Validator
//! Pilot in Command: the one place every event crosses before it is
//! trusted by the rest of the system.

mod registry;
mod symbols;

pub use registry::{validate, EventType, ValidationRejected};
pub use symbols::{is_forbidden, is_valid_symbol, normalize, FORBIDDEN_SYMBOL, TRADING_SYMBOLS};
