// SQLite persistence layer for session lineups and batch history.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::batch::BatchRunRecord;

/// SQLite-backed persistence for key-value session state and a log of
/// optimizer runs. Player data is never stored: it is reloaded from the
/// slate CSV on every start.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS session_state (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS batch_runs (
                run_id        TEXT PRIMARY KEY,
                platform      TEXT NOT NULL,
                requested     INTEGER NOT NULL,
                produced      INTEGER NOT NULL,
                duplicates    INTEGER NOT NULL,
                stopped       INTEGER NOT NULL,
                avg_projected REAL NOT NULL,
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS idx_batch_runs_platform ON batch_runs(platform);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Session state (key-value)
    // ------------------------------------------------------------------

    /// Load a previously saved JSON value by `key`. Returns `None` if the key
    /// does not exist.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT value FROM session_state WHERE key = ?1")
            .context("failed to prepare load_state query")?;

        let mut rows = stmt
            .query_map(params![key], |row| {
                let json_str: String = row.get(0)?;
                Ok(json_str)
            })
            .context("failed to query session state")?;

        match rows.next() {
            Some(row_result) => {
                let json_str = row_result.context("failed to read state row")?;
                let value: serde_json::Value = serde_json::from_str(&json_str)
                    .context("failed to deserialize state value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// All stored keys starting with `prefix`, sorted.
    pub fn state_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT key FROM session_state WHERE substr(key, 1, ?2) = ?1 ORDER BY key")
            .context("failed to prepare state_keys query")?;

        let keys = stmt
            .query_map(params![prefix, prefix.chars().count() as i64], |row| row.get(0))
            .context("failed to query state keys")?
            .collect::<std::result::Result<Vec<String>, _>>()
            .context("failed to map state key rows")?;
        Ok(keys)
    }

    /// Replace every key starting with `prefix` by `entries` in one
    /// transaction, so a crash never leaves a half-written session set.
    pub fn replace_states(
        &self,
        prefix: &str,
        entries: &[(String, serde_json::Value)],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        tx.execute(
            "DELETE FROM session_state WHERE substr(key, 1, ?2) = ?1",
            params![prefix, prefix.chars().count() as i64],
        )
        .context("failed to delete previous session state")?;
        for (key, value) in entries {
            insert_state(&tx, key, value)?;
        }
        tx.commit().context("failed to commit session state")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Batch history
    // ------------------------------------------------------------------

    /// Record a finished optimizer run. Re-recording the same run id is a
    /// no-op.
    pub fn record_batch_run(&self, run: &BatchRunRecord) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO batch_runs
                (run_id, platform, requested, produced, duplicates, stopped, avg_projected)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run.run_id,
                run.platform,
                run.requested as i64,
                run.produced as i64,
                run.duplicates as i64,
                run.stopped,
                run.avg_projected,
            ],
        )
        .context("failed to record batch run")?;
        Ok(())
    }

    /// The most recent runs for `platform`, newest first.
    pub fn load_batch_runs(&self, platform: &str, limit: usize) -> Result<Vec<BatchRunRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT run_id, platform, requested, produced, duplicates, stopped, avg_projected
                 FROM batch_runs WHERE platform = ?1
                 ORDER BY created_at DESC, run_id DESC LIMIT ?2",
            )
            .context("failed to prepare load_batch_runs query")?;

        let runs = stmt
            .query_map(params![platform, limit as i64], |row| {
                let requested: i64 = row.get(2)?;
                let produced: i64 = row.get(3)?;
                let duplicates: i64 = row.get(4)?;
                Ok(BatchRunRecord {
                    run_id: row.get(0)?,
                    platform: row.get(1)?,
                    requested: requested as usize,
                    produced: produced as usize,
                    duplicates: duplicates as usize,
                    stopped: row.get(5)?,
                    avg_projected: row.get(6)?,
                })
            })
            .context("failed to query batch runs")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map batch run rows")?;

        Ok(runs)
    }

    /// Generate a new unique run ID based on the current UTC timestamp.
    ///
    /// Format: `run_YYYYMMDD_HHMMSS_SSS` (e.g. `run_20261015_143022_123`).
    pub fn generate_run_id() -> String {
        let now = chrono::Utc::now();
        now.format("run_%Y%m%d_%H%M%S_%3f").to_string()
    }
}

/// Write one JSON value under `key`, overwriting any previous value.
fn insert_state(conn: &Connection, key: &str, value: &serde_json::Value) -> Result<()> {
    let json_str = serde_json::to_string(value).context("failed to serialize state value")?;
    conn.execute(
        "INSERT OR REPLACE INTO session_state (key, value) VALUES (?1, ?2)",
        params![key, json_str],
    )
    .context("failed to save state")?;
    Ok(())
}
