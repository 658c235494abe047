//! Typed event schema registry.
//! Mission: validate every published event at publish and at consume time,
//! so a single malformed payload can never propagate further than the
//! component that first saw it (spec §4.A).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::symbols;

/// The closed set of eight event types the observation bus and the
/// trading path are allowed to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SignalGenerated,
    FireCommand,
    TradeExecuted,
    BalanceUpdate,
    SystemHealth,
    UserAction,
    MarketData,
    PatternDetected,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::SignalGenerated,
        EventType::FireCommand,
        EventType::TradeExecuted,
        EventType::BalanceUpdate,
        EventType::SystemHealth,
        EventType::UserAction,
        EventType::MarketData,
        EventType::PatternDetected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SignalGenerated => "signal_generated",
            EventType::FireCommand => "fire_command",
            EventType::TradeExecuted => "trade_executed",
            EventType::BalanceUpdate => "balance_update",
            EventType::SystemHealth => "system_health",
            EventType::UserAction => "user_action",
            EventType::MarketData => "market_data",
            EventType::PatternDetected => "pattern_detected",
        }
    }
}

/// A publisher error (refuse to publish) or a consumer warning
/// (skip + log + ack) depending on the caller's position in the pipeline
/// — spec §4.A and the `ValidationRejected` taxonomy entry in §7.
#[derive(Debug, Clone)]
pub struct ValidationRejected {
    pub event_type: EventType,
    pub field: String,
    pub reason: String,
}

impl fmt::Display for ValidationRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rejected: field `{}`: {}",
            self.event_type.as_str(),
            self.field,
            self.reason
        )
    }
}

impl std::error::Error for ValidationRejected {}

fn require_str<'a>(
    event_type: EventType,
    obj: &'a serde_json::Map<String, Value>,
    field: &str,
) -> Result<&'a str, ValidationRejected> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationRejected {
            event_type,
            field: field.to_string(),
            reason: "required string field missing".to_string(),
        })
}

fn require_f64(
    event_type: EventType,
    obj: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<f64, ValidationRejected> {
    obj.get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| ValidationRejected {
            event_type,
            field: field.to_string(),
            reason: "required numeric field missing".to_string(),
        })
}

fn as_object(
    event_type: EventType,
    data: &Value,
) -> Result<&serde_json::Map<String, Value>, ValidationRejected> {
    data.as_object().ok_or_else(|| ValidationRejected {
        event_type,
        field: "<root>".to_string(),
        reason: "payload must be a JSON object".to_string(),
    })
}

/// Validates a JSON payload against the schema for `event_type`. Called
/// both at publish (publisher error, refuse to publish) and at consume
/// (consumer warning: skip + log + ack).
pub fn validate(event_type: EventType, data: &Value) -> Result<(), ValidationRejected> {
    let obj = as_object(event_type, data)?;

    match event_type {
        EventType::SignalGenerated => validate_signal_generated(obj),
        EventType::FireCommand => validate_fire_command(obj),
        EventType::TradeExecuted => {
            require_str(event_type, obj, "fire_id")?;
            require_str(event_type, obj, "status")?;
            Ok(())
        }
        EventType::BalanceUpdate => {
            require_str(event_type, obj, "target_uuid")?;
            require_f64(event_type, obj, "balance")?;
            Ok(())
        }
        EventType::SystemHealth => {
            require_str(event_type, obj, "component")?;
            require_str(event_type, obj, "status")?;
            Ok(())
        }
        EventType::UserAction => {
            require_str(event_type, obj, "user_id")?;
            require_str(event_type, obj, "action")?;
            Ok(())
        }
        EventType::MarketData => {
            let symbol = require_str(event_type, obj, "symbol")?;
            check_symbol(event_type, symbol)
        }
        EventType::PatternDetected => {
            require_str(event_type, obj, "pattern")?;
            let symbol = require_str(event_type, obj, "symbol")?;
            check_symbol(event_type, symbol)
        }
    }
}

fn check_symbol(event_type: EventType, symbol: &str) -> Result<(), ValidationRejected> {
    if symbols::is_forbidden(symbol) {
        return Err(ValidationRejected {
            event_type,
            field: "symbol".to_string(),
            reason: format!("{} is forbidden", symbols::FORBIDDEN_SYMBOL),
        });
    }
    if !symbols::is_valid_symbol(symbol) {
        return Err(ValidationRejected {
            event_type,
            field: "symbol".to_string(),
            reason: "symbol outside the closed 15-pair set".to_string(),
        });
    }
    Ok(())
}

fn validate_signal_generated(
    obj: &serde_json::Map<String, Value>,
) -> Result<(), ValidationRejected> {
    let event_type = EventType::SignalGenerated;

    let symbol = require_str(event_type, obj, "symbol")?;
    check_symbol(event_type, symbol)?;

    let direction = require_str(event_type, obj, "direction")?;
    if direction != "BUY" && direction != "SELL" {
        return Err(ValidationRejected {
            event_type,
            field: "direction".to_string(),
            reason: "must be BUY or SELL".to_string(),
        });
    }

    require_f64(event_type, obj, "entry")?;
    require_f64(event_type, obj, "sl")?;
    require_f64(event_type, obj, "tp")?;

    let confidence = require_f64(event_type, obj, "confidence")?;
    if !(0.0..=100.0).contains(&confidence) {
        return Err(ValidationRejected {
            event_type,
            field: "confidence".to_string(),
            reason: "must be within [0, 100]".to_string(),
        });
    }

    require_str(event_type, obj, "pattern")?;

    Ok(())
}

fn validate_fire_command(obj: &serde_json::Map<String, Value>) -> Result<(), ValidationRejected> {
    let event_type = EventType::FireCommand;

    require_str(event_type, obj, "user_id")?;

    let symbol = require_str(event_type, obj, "symbol")?;
    check_symbol(event_type, symbol)?;

    let direction = require_str(event_type, obj, "direction")?;
    if direction != "BUY" && direction != "SELL" {
        return Err(ValidationRejected {
            event_type,
            field: "direction".to_string(),
            reason: "must be BUY or SELL".to_string(),
        });
    }

    require_f64(event_type, obj, "lot")?;
    require_f64(event_type, obj, "sl")?;
    require_f64(event_type, obj, "tp")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_valid_signal_generated() {
        let payload = json!({
            "signal_id": "EG-1",
            "symbol": "EURUSD",
            "direction": "BUY",
            "entry": 1.0850,
            "sl": 1.0830,
            "tp": 1.0890,
            "confidence": 87.5,
            "pattern": "LIQUIDITY_SWEEP_REVERSAL",
        });
        assert!(validate(EventType::SignalGenerated, &payload).is_ok());
    }

    #[test]
    fn rejects_forbidden_symbol_in_signal() {
        let payload = json!({
            "symbol": "XAUUSD",
            "direction": "BUY",
            "entry": 1.0, "sl": 1.0, "tp": 1.0, "confidence": 50.0,
            "pattern": "X",
        });
        let err = validate(EventType::SignalGenerated, &payload).unwrap_err();
        assert_eq!(err.field, "symbol");
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let payload = json!({
            "symbol": "EURUSD", "direction": "BUY",
            "entry": 1.0, "sl": 1.0, "tp": 1.0, "confidence": 150.0,
            "pattern": "X",
        });
        assert!(validate(EventType::SignalGenerated, &payload).is_err());
    }

    #[test]
    fn rejects_bad_direction() {
        let payload = json!({
            "symbol": "EURUSD", "direction": "LONG",
            "entry": 1.0, "sl": 1.0, "tp": 1.0, "confidence": 50.0,
            "pattern": "X",
        });
        assert!(validate(EventType::SignalGenerated, &payload).is_err());
    }

    #[test]
    fn fire_command_requires_numeric_lot() {
        let payload = json!({
            "user_id": "42", "symbol": "GBPUSD", "direction": "SELL",
            "lot": "not-a-number", "sl": 1.27, "tp": 1.26,
        });
        assert!(validate(EventType::FireCommand, &payload).is_err());
    }
}
