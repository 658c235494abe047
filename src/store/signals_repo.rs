//! Signals table access.
//! Mission: one row per `signal_id`, idempotent on insert.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::store::models::{Direction, Signal};

pub struct SignalsRepo<'a> {
    pub(super) conn: &'a Connection,
}

impl<'a> SignalsRepo<'a> {
    /// Inserts the signal if `signal_id` is not already present. Returns
    /// `true` if a new row was written, `false` if it was a duplicate —
    /// the store check is authoritative for the idempotency invariant in
    /// spec §4.B ("a duplicate payload must result in no new DB row").
    pub fn insert_if_absent(&self, signal: &Signal) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO signals
                 (signal_id, symbol, direction, entry, sl, tp, confidence, pattern, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    signal.signal_id,
                    signal.symbol,
                    signal.direction.as_str(),
                    signal.entry,
                    signal.sl,
                    signal.tp,
                    signal.confidence,
                    signal.pattern,
                    signal.created_at.to_rfc3339(),
                ],
            )
            .context("insert signal")?;
        Ok(rows == 1)
    }

    pub fn get(&self, signal_id: &str) -> Result<Option<Signal>> {
        self.conn
            .query_row(
                "SELECT signal_id, symbol, direction, entry, sl, tp, confidence, pattern, created_at
                 FROM signals WHERE signal_id = ?1",
                params![signal_id],
                row_to_signal,
            )
            .optional()
            .context("load signal")
    }

    pub fn exists(&self, signal_id: &str) -> Result<bool> {
        Ok(self.get(signal_id)?.is_some())
    }

    /// Marks a signal as durably appended to the signals stream. Lets a
    /// restarted ingest bridge tell apart "row written, stream append
    /// still pending" from "fully durable" (spec §4.B crash-safety: if
    /// the process dies between DB insert and stream append, restart
    /// must detect and append missing entries).
    pub fn mark_streamed(&self, signal_id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE signals SET streamed = 1 WHERE signal_id = ?1",
                params![signal_id],
            )
            .context("mark signal streamed")?;
        Ok(())
    }

    pub fn list_unstreamed(&self) -> Result<Vec<Signal>> {
        let mut stmt = self.conn.prepare(
            "SELECT signal_id, symbol, direction, entry, sl, tp, confidence, pattern, created_at
             FROM signals WHERE streamed = 0 ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![], row_to_signal)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list unstreamed signals")?;
        Ok(rows)
    }
}

fn row_to_signal(row: &rusqlite::Row) -> rusqlite::Result<Signal> {
    let direction: String = row.get(2)?;
    let created_at: String = row.get(8)?;
    Ok(Signal {
        signal_id: row.get(0)?,
        symbol: row.get(1)?,
        direction: Direction::parse(&direction).unwrap_or(Direction::Buy),
        entry: row.get(3)?,
        sl: row.get(4)?,
        tp: row.get(5)?,
        confidence: row.get(6)?,
        pattern: row.get(7)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
