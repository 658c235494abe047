//! State Store Schema (component K, spec §4.K / §6.1).
//! Mission: the only shared mutable resource in the system. All writes go
//! through row-level transactions; cross-row invariants (idempotency) are
//! enforced by unique indexes, not application-level locks (spec §5).
//!
//! Connections are opened short-lived per call — the same convention as
//! the teacher's `UserStore`/`db_storage` modules — so that no component
//! ever holds a lock across a suspension point.

mod confirmations_repo;
mod ea_repo;
mod events_repo;
mod fires_repo;
pub mod models;
mod schema;
mod signals_repo;

pub use confirmations_repo::ConfirmationsRepo;
pub use ea_repo::EaRepo;
pub use events_repo::EventsRepo;
pub use fires_repo::FiresRepo;
pub use signals_repo::SignalsRepo;

use anyhow::{Context, Result};
use rusqlite::Connection;

#[derive(Clone)]
pub struct Store {
    db_path: String,
}

impl Store {
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.open()?;
        conn.execute_batch(schema::SCHEMA_SQL)
            .context("apply state store schema")?;
        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("open state store")
    }

    pub fn signals(&self) -> Result<SignalsRepoHandle> {
        Ok(SignalsRepoHandle { conn: self.open()? })
    }

    pub fn fires(&self) -> Result<FiresRepoHandle> {
        Ok(FiresRepoHandle { conn: self.open()? })
    }

    pub fn ea_instances(&self) -> Result<EaRepoHandle> {
        Ok(EaRepoHandle { conn: self.open()? })
    }

    pub fn confirmations(&self) -> Result<ConfirmationsRepoHandle> {
        Ok(ConfirmationsRepoHandle { conn: self.open()? })
    }

    pub fn events(&self) -> Result<EventsRepoHandle> {
        Ok(EventsRepoHandle { conn: self.open()? })
    }
}

/// Connection-owning handles let callers borrow a `*Repo<'_>` for the
/// lifetime of one store operation without threading a pool through the
/// whole codebase.
pub struct SignalsRepoHandle {
    conn: Connection,
}
impl SignalsRepoHandle {
    pub fn repo(&self) -> SignalsRepo<'_> {
        SignalsRepo { conn: &self.conn }
    }
}

pub struct FiresRepoHandle {
    conn: Connection,
}
impl FiresRepoHandle {
    pub fn repo(&self) -> FiresRepo<'_> {
        FiresRepo { conn: &self.conn }
    }
}

pub struct EaRepoHandle {
    conn: Connection,
}
impl EaRepoHandle {
    pub fn repo(&self) -> EaRepo<'_> {
        EaRepo { conn: &self.conn }
    }
}

pub struct ConfirmationsRepoHandle {
    conn: Connection,
}
impl ConfirmationsRepoHandle {
    pub fn repo(&self) -> ConfirmationsRepo<'_> {
        ConfirmationsRepo { conn: &self.conn }
    }
}

pub struct EventsRepoHandle {
    conn: Connection,
}
impl EventsRepoHandle {
    pub fn repo(&self) -> EventsRepo<'_> {
        EventsRepo { conn: &self.conn }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{Direction, Fire, FireStatus, Signal};
    use chrono::Utc;

    fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = Store::new(path.to_str().unwrap()).unwrap();
        (store, dir)
    }

    #[test]
    fn signal_insert_is_idempotent() {
        let (store, _dir) = temp_store();
        let signal = Signal {
            signal_id: "EG-1".to_string(),
            symbol: "EURUSD".to_string(),
            direction: Direction::Buy,
            entry: 1.085,
            sl: 1.083,
            tp: 1.089,
            confidence: 87.5,
            pattern: "LIQUIDITY_SWEEP_REVERSAL".to_string(),
            created_at: Utc::now(),
        };
        let handle = store.signals().unwrap();
        assert!(handle.repo().insert_if_absent(&signal).unwrap());
        assert!(!handle.repo().insert_if_absent(&signal).unwrap());
        assert!(handle.repo().exists("EG-1").unwrap());
    }

    #[test]
    fn fire_idem_key_is_unique_per_user() {
        let (store, _dir) = temp_store();
        let now = Utc::now();
        let fire = Fire {
            fire_id: "f1".to_string(),
            idem_key: "abc".to_string(),
            user_id: "42".to_string(),
            signal_id: None,
            target_uuid: "U-7".to_string(),
            symbol: "GBPUSD".to_string(),
            direction: Direction::Sell,
            lot: 0.10,
            sl: 1.27,
            tp: 1.26,
            comment: None,
            status: FireStatus::Pending,
            ticket: None,
            created_at: now,
            updated_at: now,
        };
        let handle = store.fires().unwrap();
        handle.repo().insert_pending(&fire).unwrap();

        let dup = handle.repo().find_by_idem("42", "abc").unwrap();
        assert!(dup.is_some());
        assert_eq!(dup.unwrap().fire_id, "f1");

        // A second insert attempt with the same (user_id, idem_key) must
        // violate the unique index.
        let mut other = fire.clone();
        other.fire_id = "f2".to_string();
        assert!(handle.repo().insert_pending(&other).is_err());
    }

    #[test]
    fn ea_freshness_threshold() {
        let (store, _dir) = temp_store();
        let handle = store.ea_instances().unwrap();
        let now = Utc::now();
        handle
            .repo()
            .upsert_heartbeat("U-7", "42", now - chrono::Duration::seconds(200), None, None)
            .unwrap();
        let ea = handle.repo().get("U-7").unwrap().unwrap();
        assert!(!ea.is_fresh(now, std::time::Duration::from_secs(180)));
    }
}
