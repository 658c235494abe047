//! Fires table access.
//! Mission: enforce the `(user_id, idem_key)` uniqueness invariant and the
//! status machine transitions from spec §3 "Fire".

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::store::models::{Direction, Fire, FireStatus};

pub struct FiresRepo<'a> {
    pub(super) conn: &'a Connection,
}

impl<'a> FiresRepo<'a> {
    /// Looks up an existing fire by `(user_id, idem_key)`. If found, the
    /// caller returns the existing `fire_id` with `status=deduplicated`
    /// instead of inserting (spec §4.E step 3).
    pub fn find_by_idem(&self, user_id: &str, idem_key: &str) -> Result<Option<Fire>> {
        self.conn
            .query_row(
                "SELECT fire_id, idem_key, user_id, signal_id, target_uuid, symbol, direction,
                        lot, sl, tp, comment, status, ticket, created_at, updated_at
                 FROM fires WHERE user_id = ?1 AND idem_key = ?2",
                params![user_id, idem_key],
                row_to_fire,
            )
            .optional()
            .context("lookup fire by idem_key")
    }

    pub fn get(&self, fire_id: &str) -> Result<Option<Fire>> {
        self.conn
            .query_row(
                "SELECT fire_id, idem_key, user_id, signal_id, target_uuid, symbol, direction,
                        lot, sl, tp, comment, status, ticket, created_at, updated_at
                 FROM fires WHERE fire_id = ?1",
                params![fire_id],
                row_to_fire,
            )
            .optional()
            .context("load fire")
    }

    /// Inserts a new fire row with `status=PENDING`. The `UNIQUE(user_id,
    /// idem_key)` index is the only enforcement of the idempotency
    /// invariant — no application-level lock (spec §5).
    pub fn insert_pending(&self, fire: &Fire) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO fires
                 (fire_id, idem_key, user_id, signal_id, target_uuid, symbol, direction,
                  lot, sl, tp, comment, status, ticket, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    fire.fire_id,
                    fire.idem_key,
                    fire.user_id,
                    fire.signal_id,
                    fire.target_uuid,
                    fire.symbol,
                    fire.direction.as_str(),
                    fire.lot,
                    fire.sl,
                    fire.tp,
                    fire.comment,
                    fire.status.as_str(),
                    fire.ticket,
                    fire.created_at.to_rfc3339(),
                    fire.updated_at.to_rfc3339(),
                ],
            )
            .context("insert fire")?;
        Ok(())
    }

    pub fn set_status(&self, fire_id: &str, status: FireStatus, now: DateTime<Utc>) -> Result<()> {
        self.conn
            .execute(
                "UPDATE fires SET status = ?1, updated_at = ?2 WHERE fire_id = ?3",
                params![status.as_str(), now.to_rfc3339(), fire_id],
            )
            .context("update fire status")?;
        Ok(())
    }

    pub fn set_ticket(&self, fire_id: &str, ticket: &str, now: DateTime<Utc>) -> Result<()> {
        self.conn
            .execute(
                "UPDATE fires SET ticket = ?1, updated_at = ?2 WHERE fire_id = ?3",
                params![ticket, now.to_rfc3339(), fire_id],
            )
            .context("update fire ticket")?;
        Ok(())
    }

    /// Fires in a non-terminal status — candidates for the stuck-fire
    /// watchdog (spec §8 invariant 3).
    pub fn list_non_terminal(&self) -> Result<Vec<Fire>> {
        let mut stmt = self.conn.prepare(
            "SELECT fire_id, idem_key, user_id, signal_id, target_uuid, symbol, direction,
                    lot, sl, tp, comment, status, ticket, created_at, updated_at
             FROM fires WHERE status NOT IN ('FILLED', 'REJECTED', 'CANCELLED')",
        )?;
        let rows = stmt
            .query_map([], row_to_fire)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list non-terminal fires")?;
        Ok(rows)
    }
}

fn row_to_fire(row: &rusqlite::Row) -> rusqlite::Result<Fire> {
    let direction: String = row.get(6)?;
    let status: String = row.get(11)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;
    Ok(Fire {
        fire_id: row.get(0)?,
        idem_key: row.get(1)?,
        user_id: row.get(2)?,
        signal_id: row.get(3)?,
        target_uuid: row.get(4)?,
        symbol: row.get(5)?,
        direction: Direction::parse(&direction).unwrap_or(Direction::Buy),
        lot: row.get(7)?,
        sl: row.get(8)?,
        tp: row.get(9)?,
        comment: row.get(10)?,
        status: FireStatus::parse(&status).unwrap_or(FireStatus::Pending),
        ticket: row.get(12)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
