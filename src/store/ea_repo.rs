//! EA instance table access.
//! Mission: track heartbeats; freshness is computed, never stored
//! (spec §3 "EA Instance": "registered on first heartbeat ... fresh if
//! now - last_seen < 180s").

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::store::models::EaInstance;

pub struct EaRepo<'a> {
    pub(super) conn: &'a Connection,
}

impl<'a> EaRepo<'a> {
    /// Registers the EA on first heartbeat, updates `last_seen` otherwise.
    pub fn upsert_heartbeat(
        &self,
        target_uuid: &str,
        user_id: &str,
        now: DateTime<Utc>,
        balance: Option<f64>,
        equity: Option<f64>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO ea_instances (target_uuid, user_id, last_seen, balance, equity, symbol_map)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL)
                 ON CONFLICT(target_uuid) DO UPDATE SET
                     last_seen = excluded.last_seen,
                     balance = COALESCE(excluded.balance, ea_instances.balance),
                     equity = COALESCE(excluded.equity, ea_instances.equity)",
                params![target_uuid, user_id, now.to_rfc3339(), balance, equity],
            )
            .context("upsert EA heartbeat")?;
        Ok(())
    }

    pub fn get(&self, target_uuid: &str) -> Result<Option<EaInstance>> {
        self.conn
            .query_row(
                "SELECT target_uuid, user_id, last_seen, balance, equity, symbol_map
                 FROM ea_instances WHERE target_uuid = ?1",
                params![target_uuid],
                row_to_ea,
            )
            .optional()
            .context("load EA instance")
    }

    /// Resolves the EA bound to `user_id`. Server-side resolution — the
    /// caller of the Fire Command Router may not override `target_uuid`
    /// directly (spec §4.E step 1).
    pub fn find_by_user(&self, user_id: &str) -> Result<Option<EaInstance>> {
        self.conn
            .query_row(
                "SELECT target_uuid, user_id, last_seen, balance, equity, symbol_map
                 FROM ea_instances WHERE user_id = ?1",
                params![user_id],
                row_to_ea,
            )
            .optional()
            .context("resolve EA by user_id")
    }

    pub fn list_all(&self) -> Result<Vec<EaInstance>> {
        let mut stmt = self
            .conn
            .prepare("SELECT target_uuid, user_id, last_seen, balance, equity, symbol_map FROM ea_instances")?;
        let rows = stmt
            .query_map([], row_to_ea)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list EA instances")?;
        Ok(rows)
    }

    pub fn list_stale(&self, now: DateTime<Utc>, threshold: std::time::Duration) -> Result<Vec<EaInstance>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|ea| !ea.is_fresh(now, threshold))
            .collect())
    }
}

fn row_to_ea(row: &rusqlite::Row) -> rusqlite::Result<EaInstance> {
    let last_seen: String = row.get(2)?;
    Ok(EaInstance {
        target_uuid: row.get(0)?,
        user_id: row.get(1)?,
        last_seen: DateTime::parse_from_rfc3339(&last_seen)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        balance: row.get(3)?,
        equity: row.get(4)?,
        symbol_map: row.get(5)?,
    })
}
