//! Confirmations table access.
//! Mission: idempotent on `(fire_id, sequence)` (spec §3 "Confirmation",
//! §4.G).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::store::models::{Confirmation, ConfirmationStatus};

pub struct ConfirmationsRepo<'a> {
    pub(super) conn: &'a Connection,
}

impl<'a> ConfirmationsRepo<'a> {
    /// Returns `true` if a new row was written. A second delivery of the
    /// same `(fire_id, sequence)` is a no-op, not an error.
    pub fn insert_if_absent(&self, confirmation: &Confirmation) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO confirmations
                 (fire_id, sequence, ticket, fill_price, fill_volume, status, broker_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    confirmation.fire_id,
                    confirmation.sequence,
                    confirmation.ticket,
                    confirmation.fill_price,
                    confirmation.fill_volume,
                    confirmation.status.as_str(),
                    confirmation.broker_ts.to_rfc3339(),
                ],
            )
            .context("insert confirmation")?;
        Ok(rows == 1)
    }

    /// Whether a `FILLED` confirmation has already been recorded for this
    /// fire — the final-fill marker (SPEC_FULL.md §9).
    pub fn has_final_fill(&self, fire_id: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM confirmations WHERE fire_id = ?1 AND status = 'FILLED'",
                params![fire_id],
                |row| row.get(0),
            )
            .context("check final fill")?;
        Ok(count > 0)
    }

    pub fn list_for_fire(&self, fire_id: &str) -> Result<Vec<Confirmation>> {
        let mut stmt = self.conn.prepare(
            "SELECT fire_id, sequence, ticket, fill_price, fill_volume, status, broker_ts
             FROM confirmations WHERE fire_id = ?1 ORDER BY sequence ASC",
        )?;
        let rows = stmt
            .query_map(params![fire_id], row_to_confirmation)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list confirmations")?;
        Ok(rows)
    }
}

fn row_to_confirmation(row: &rusqlite::Row) -> rusqlite::Result<Confirmation> {
    let status: String = row.get(5)?;
    let broker_ts: String = row.get(6)?;
    Ok(Confirmation {
        fire_id: row.get(0)?,
        sequence: row.get(1)?,
        ticket: row.get(2)?,
        fill_price: row.get(3)?,
        fill_volume: row.get(4)?,
        status: ConfirmationStatus::parse(&status).unwrap_or(ConfirmationStatus::Partial),
        broker_ts: DateTime::parse_from_rfc3339(&broker_ts)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
