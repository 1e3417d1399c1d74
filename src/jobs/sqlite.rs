// src/jobs/sqlite.rs

//! `SQLite`-backed [`JobStore`].

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::{MonobuildError, Result};
use crate::jobs::store::{JobStore, QueuedJob, StoreOp};
use crate::jobs::{AwakenedFrom, Job};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS kv (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS queue (
        seq   INTEGER PRIMARY KEY AUTOINCREMENT,
        entry TEXT NOT NULL
    );
";

/// Queue row payload; `seq` lives in its own column.
#[derive(Serialize, Deserialize)]
struct QueueEntry {
    job: Job,
    #[serde(default)]
    awakened_from: Option<AwakenedFrom>,
}

/// Job store persisted in a single `SQLite` file.
///
/// Every [`JobStore::apply`] batch runs in one transaction.
#[derive(Debug)]
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = ?path, "opened job store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A private, non-durable store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MonobuildError::Other(anyhow!("job store connection lock poisoned")))
    }
}

fn decode_row(seq: i64, entry: &str) -> Result<QueuedJob> {
    let QueueEntry { job, awakened_from } = serde_json::from_str(entry)?;
    let seq = u64::try_from(seq)
        .map_err(|_| MonobuildError::Other(anyhow!("negative queue sequence {seq}")))?;
    Ok(QueuedJob {
        seq,
        job,
        awakened_from,
    })
}

impl JobStore for SqliteJobStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn peek(&self) -> Result<Option<QueuedJob>> {
        let conn = self.lock()?;
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT seq, entry FROM queue ORDER BY seq LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(seq, entry)| decode_row(seq, &entry)).transpose()
    }

    fn pending(&self) -> Result<Vec<QueuedJob>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT seq, entry FROM queue ORDER BY seq")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|(seq, entry)| decode_row(*seq, entry))
            .collect()
    }

    fn apply(&self, ops: Vec<StoreOp>) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for op in ops {
            match op {
                StoreOp::Put { key, value } => {
                    tx.execute(
                        "INSERT INTO kv (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                        rusqlite::params![key, serde_json::to_string(&value)?],
                    )?;
                }
                StoreOp::Delete { key } => {
                    tx.execute("DELETE FROM kv WHERE key = ?1", [key])?;
                }
                StoreOp::Enqueue { job, awakened_from } => {
                    let entry = serde_json::to_string(&QueueEntry { job, awakened_from })?;
                    tx.execute("INSERT INTO queue (entry) VALUES (?1)", [entry])?;
                }
                StoreOp::Ack { seq } => {
                    let seq = i64::try_from(seq)
                        .map_err(|_| MonobuildError::Other(anyhow!("queue sequence {seq} out of range")))?;
                    tx.execute("DELETE FROM queue WHERE seq = ?1", [seq])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}
