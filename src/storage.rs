use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use crate::ledger::{HistoryEntry, Ledger, PendingPrediction};

// Key names predate this process; stores written by earlier builds load
// unchanged.
const KEY_HISTORY: &str = "predictionHistory";
const KEY_PENDING: &str = "lastPrediction";

pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }

    /// Load the ledger, tolerating anything short of a readable store:
    /// a missing key or an undecodable value falls back to the empty
    /// ledger (or an absent pending slot) rather than failing startup.
    pub fn load_ledger(&self) -> Ledger {
        let entries: Vec<HistoryEntry> = self
            .read_key(KEY_HISTORY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        let pending: Option<PendingPrediction> = self
            .read_key(KEY_PENDING)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Ledger::from_parts(entries, pending)
    }

    /// Persist both ledger keys in one transaction.
    pub fn save_ledger(&mut self, ledger: &Ledger) -> Result<()> {
        let history = serde_json::to_string(ledger.entries())?;
        let pending = serde_json::to_string(&ledger.pending())?;
        let tx = self.conn.transaction()?;
        for (key, value) in [(KEY_HISTORY, &history), (KEY_PENDING, &pending)] {
            tx.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn read_key(&self, key: &str) -> Option<String> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .ok()
            .flatten()
    }

    #[cfg(test)]
    fn write_key(&mut self, key: &str, value: &str) {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .unwrap();
    }
}
