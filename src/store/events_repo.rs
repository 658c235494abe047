//! Events table access — the unified sink for the observation bus
//! (spec §4.H), replacing every ad-hoc JSONL tracking file the source
//! repo used to write (spec §9 "Ad-hoc JSONL tracking files → the
//! observation bus").

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::schema::EventType;
use crate::store::models::ObservedEvent;

pub struct EventsRepo<'a> {
    pub(super) conn: &'a Connection,
}

impl<'a> EventsRepo<'a> {
    /// Exactly-once into the analytics store is not guaranteed (spec
    /// §4.H); `INSERT OR IGNORE` on the primary key lets duplicate
    /// deliveries dedupe by `event_id` for free.
    pub fn insert(&self, event: &ObservedEvent) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO events
                 (event_id, event_type, timestamp, source, correlation_id, user_id, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.event_id,
                    event.event_type.as_str(),
                    event.timestamp.to_rfc3339(),
                    event.source,
                    event.correlation_id,
                    event.user_id,
                    event.data.to_string(),
                ],
            )
            .context("insert observed event")?;
        Ok(())
    }

    pub fn recent_by_type(&self, event_type: EventType, limit: usize) -> Result<Vec<ObservedEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, event_type, timestamp, source, correlation_id, user_id, data
             FROM events WHERE event_type = ?1 ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![event_type.as_str(), limit as i64], row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list observed events")?;
        Ok(rows)
    }
}

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<ObservedEvent> {
    let event_type: String = row.get(1)?;
    let timestamp: String = row.get(2)?;
    let data: String = row.get(6)?;
    let event_type = match event_type.as_str() {
        "signal_generated" => EventType::SignalGenerated,
        "fire_command" => EventType::FireCommand,
        "trade_executed" => EventType::TradeExecuted,
        "balance_update" => EventType::BalanceUpdate,
        "system_health" => EventType::SystemHealth,
        "user_action" => EventType::UserAction,
        "market_data" => EventType::MarketData,
        _ => EventType::PatternDetected,
    };
    Ok(ObservedEvent {
        event_id: row.get(0)?,
        event_type,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        source: row.get(3)?,
        correlation_id: row.get(4)?,
        user_id: row.get(5)?,
        data: serde_json::from_str(&data).unwrap_or(serde_json::Value::Null),
    })
}
