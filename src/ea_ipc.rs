//! EA IPC channel contract (spec §6).
//! Mission: the exact file-based wire format the broker-side agent (EA)
//! speaks — a fixed-arity CSV fire file and a JSON confirmation file.
//!
//! Grounded on `other_examples` `poruru210-sankey-copier/mt-bridge` (an
//! EA<->relay message contract of the same shape) and the teacher's
//! `src/edge/wire.rs` "fixed contract, sentinel-marked presence" idiom —
//! adapted to the plain-text formats spec §6 fixes rather than a packed
//! binary struct.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::models::Direction;

/// One fire instruction as written to the EA's IPC file.
/// CSV layout: `fire_id,symbol,direction,lot,price,tp,sl[,comment]`.
#[derive(Debug, Clone)]
pub struct FireInstruction {
    pub fire_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub lot: f64,
    pub price: f64,
    pub tp: f64,
    pub sl: f64,
    pub comment: Option<String>,
}

impl FireInstruction {
    fn to_csv_line(&self) -> String {
        let mut line = format!(
            "{},{},{},{},{},{},{}",
            self.fire_id,
            self.symbol,
            self.direction.as_str(),
            self.lot,
            self.price,
            self.tp,
            self.sl
        );
        if let Some(comment) = &self.comment {
            line.push(',');
            line.push_str(comment);
        }
        line
    }
}

/// The broker's asynchronous reply, read back from the companion
/// confirmation file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationFile {
    pub fire_id: String,
    pub status: String,
    pub ticket: String,
    pub price: f64,
    pub timestamp: String,
}

/// A file-backed IPC channel rooted at one directory per EA
/// (`<dir>/<target_uuid>/`).
pub struct EaIpc {
    root: PathBuf,
}

impl EaIpc {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn ea_dir(&self, target_uuid: &str) -> PathBuf {
        self.root.join(target_uuid)
    }

    fn fire_path(&self, target_uuid: &str, fire_id: &str) -> PathBuf {
        self.ea_dir(target_uuid).join(format!("{fire_id}.fire"))
    }

    fn confirmation_path(&self, target_uuid: &str, fire_id: &str) -> PathBuf {
        self.ea_dir(target_uuid)
            .join(format!("{fire_id}.confirmation"))
    }

    /// Writes the fire file. Presence of the file indicates a pending
    /// fire to the EA; absence indicates processed (spec §6).
    pub fn write_fire(&self, target_uuid: &str, instruction: &FireInstruction) -> Result<()> {
        let dir = self.ea_dir(target_uuid);
        fs::create_dir_all(&dir).context("create EA IPC directory")?;
        let path = self.fire_path(target_uuid, &instruction.fire_id);
        fs::write(&path, instruction.to_csv_line()).context("write fire IPC file")?;
        Ok(())
    }

    pub fn is_pending(&self, target_uuid: &str, fire_id: &str) -> bool {
        self.fire_path(target_uuid, fire_id).exists()
    }

    /// Reads and removes a confirmation file if present. Removal makes
    /// the read idempotent at the filesystem level; the caller is still
    /// responsible for the `(fire_id, sequence)` idempotency check in the
    /// state store.
    pub fn take_confirmation(
        &self,
        target_uuid: &str,
        fire_id: &str,
    ) -> Result<Option<ConfirmationFile>> {
        let path = self.confirmation_path(target_uuid, fire_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).context("read confirmation file")?;
        let parsed: ConfirmationFile =
            serde_json::from_str(&raw).context("parse confirmation file")?;
        fs::remove_file(&path).ok();
        Ok(Some(parsed))
    }

    /// Lists confirmation files across every EA directory — used by the
    /// Confirmation Listener when it runs in file-watcher mode instead of
    /// consuming a live socket (spec §6 "a pull socket (or file watcher)").
    pub fn scan_confirmations(&self) -> Result<Vec<(String, ConfirmationFile)>> {
        let mut found = Vec::new();
        if !self.root.exists() {
            return Ok(found);
        }
        for ea_dir in fs::read_dir(&self.root).context("scan EA IPC root")? {
            let ea_dir = ea_dir?;
            if !ea_dir.file_type()?.is_dir() {
                continue;
            }
            for entry in fs::read_dir(ea_dir.path())? {
                let entry = entry?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("confirmation") {
                    continue;
                }
                if let Ok(raw) = fs::read_to_string(&path) {
                    if let Ok(parsed) = serde_json::from_str::<ConfirmationFile>(&raw) {
                        found.push((parsed.fire_id.clone(), parsed));
                        fs::remove_file(&path).ok();
                    }
                }
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_csv_line_matches_contract() {
        let instruction = FireInstruction {
            fire_id: "f1".to_string(),
            symbol: "GBPUSD".to_string(),
            direction: Direction::Sell,
            lot: 0.10,
            price: 1.275,
            tp: 1.26,
            sl: 1.27,
            comment: None,
        };
        assert_eq!(
            instruction.to_csv_line(),
            "f1,GBPUSD,SELL,0.1,1.275,1.26,1.27"
        );
    }

    #[test]
    fn write_then_detect_presence() {
        let dir = tempfile::tempdir().unwrap();
        let ipc = EaIpc::new(dir.path());
        let instruction = FireInstruction {
            fire_id: "f2".to_string(),
            symbol: "EURUSD".to_string(),
            direction: Direction::Buy,
            lot: 0.5,
            price: 1.085,
            tp: 1.089,
            sl: 1.083,
            comment: Some("manual".to_string()),
        };
        ipc.write_fire("U-1", &instruction).unwrap();
        assert!(ipc.is_pending("U-1", "f2"));
    }

    #[test]
    fn confirmation_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ipc = EaIpc::new(dir.path());
        fs::create_dir_all(dir.path().join("U-1")).unwrap();
        fs::write(
            dir.path().join("U-1").join("f3.confirmation"),
            r#"{"fire_id":"f3","status":"FILLED","ticket":"T1","price":1.085,"timestamp":"2026-07-27T00:00:00Z"}"#,
        )
        .unwrap();

        let confirmation = ipc.take_confirmation("U-1", "f3").unwrap().unwrap();
        assert_eq!(confirmation.status, "FILLED");
        assert!(ipc.take_confirmation("U-1", "f3").unwrap().is_none());
    }
}
