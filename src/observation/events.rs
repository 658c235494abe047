//! Event envelope carried over the observation bus (spec §4.H, §6).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::EventType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: String,
    pub event_type: EventType,
    pub timestamp: chrono::DateTime<Utc>,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub data: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(event_type: EventType, source: &str, data: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            source: source.to_string(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}
