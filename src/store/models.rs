//! Entity shapes for the state store (spec §3).
//! Mission: closed, typed shapes per entity — no ad-hoc dictionaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "BUY" => Some(Direction::Buy),
            "SELL" => Some(Direction::Sell),
            _ => None,
        }
    }
}

/// A trading decision produced by the upstream strategy (spec §3 "Signal").
/// Immutable once created by the Signal Ingest Bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry: f64,
    pub sl: f64,
    pub tp: f64,
    pub confidence: f64,
    pub pattern: String,
    pub created_at: DateTime<Utc>,
}

/// Fire status machine: `PENDING -> ENQUEUED -> ROUTED -> FILLED | REJECTED
/// | CANCELLED`. Any status other than the three terminal ones is subject
/// to the stuck-fire watchdog (spec §3 "Fire").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FireStatus {
    Pending,
    Enqueued,
    Routed,
    Filled,
    Rejected,
    Cancelled,
}

impl FireStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FireStatus::Pending => "PENDING",
            FireStatus::Enqueued => "ENQUEUED",
            FireStatus::Routed => "ROUTED",
            FireStatus::Filled => "FILLED",
            FireStatus::Rejected => "REJECTED",
            FireStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PENDING" => Some(FireStatus::Pending),
            "ENQUEUED" => Some(FireStatus::Enqueued),
            "ROUTED" => Some(FireStatus::Routed),
            "FILLED" => Some(FireStatus::Filled),
            "REJECTED" => Some(FireStatus::Rejected),
            "CANCELLED" => Some(FireStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FireStatus::Filled | FireStatus::Rejected | FireStatus::Cancelled
        )
    }
}

/// A per-user request to execute a signal against a specific EA (spec §3 "Fire").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fire {
    pub fire_id: String,
    pub idem_key: String,
    pub user_id: String,
    pub signal_id: Option<String>,
    pub target_uuid: String,
    pub symbol: String,
    pub direction: Direction,
    pub lot: f64,
    pub sl: f64,
    pub tp: f64,
    pub comment: Option<String>,
    pub status: FireStatus,
    pub ticket: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A live broker-side agent (spec §3 "EA Instance").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EaInstance {
    pub target_uuid: String,
    pub user_id: String,
    pub last_seen: DateTime<Utc>,
    pub balance: Option<f64>,
    pub equity: Option<f64>,
    pub symbol_map: Option<String>,
}

impl EaInstance {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_seen
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, threshold: std::time::Duration) -> bool {
        let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::zero());
        self.age(now) < threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfirmationStatus {
    Filled,
    Rejected,
    Partial,
}

impl ConfirmationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationStatus::Filled => "FILLED",
            ConfirmationStatus::Rejected => "REJECTED",
            ConfirmationStatus::Partial => "PARTIAL",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "FILLED" => Some(ConfirmationStatus::Filled),
            "REJECTED" => Some(ConfirmationStatus::Rejected),
            "PARTIAL" => Some(ConfirmationStatus::Partial),
            _ => None,
        }
    }
}

/// An asynchronous reply from the broker side (spec §3 "Confirmation").
/// Identity is `(fire_id, sequence)`; `sequence` increases across
/// partial/final fills; `status = FILLED` is the final-fill marker
/// (SPEC_FULL.md §9 open-question resolution).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confirmation {
    pub fire_id: String,
    pub sequence: i64,
    pub ticket: String,
    pub fill_price: f64,
    pub fill_volume: f64,
    pub status: ConfirmationStatus,
    pub broker_ts: DateTime<Utc>,
}

/// A normalized lifecycle record (spec §3 "Observed Event").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedEvent {
    pub event_id: String,
    pub event_type: crate::schema::EventType,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub correlation_id: Option<String>,
    pub user_id: Option<String>,
    pub data: serde_json::Value,
}
