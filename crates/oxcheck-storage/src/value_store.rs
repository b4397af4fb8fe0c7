use crate::error::Result;
use crate::{validate_host_name, ValueStoreBackend};
use chrono::Utc;
use oxcheck_common::types::ServiceId;
use oxcheck_plugin::value_store::HostValueStore;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const VALUE_STORE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS value_store (
    host TEXT NOT NULL,
    service TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (host, service, key)
);
";

pub const DB_FILE: &str = "value_store.db";

/// Value stores of all hosts in `<data_dir>/value_store.db`.
///
/// The service column holds the JSON-encoded [`ServiceId`]; values are JSON
/// text.
pub struct SqliteValueStore {
    conn: Mutex<Connection>,
}

impl SqliteValueStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let conn = Connection::open(data_dir.join(DB_FILE))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(VALUE_STORE_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used in tests and one-shot CLI runs.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(VALUE_STORE_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ValueStoreBackend for SqliteValueStore {
    fn load(&self, host: &str) -> Result<HostValueStore> {
        validate_host_name(host)?;
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT service, key, value FROM value_store WHERE host = ?1 ORDER BY service, key",
        )?;
        let rows = stmt.query_map(params![host], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut store = HostValueStore::new();
        for row in rows {
            let (service, key, value) = row?;
            let id: ServiceId = serde_json::from_str(&service)?;
            store
                .service_mut(&id)
                .insert(key, serde_json::from_str(&value)?);
        }
        Ok(store)
    }

    fn save(&self, host: &str, store: &HostValueStore) -> Result<()> {
        validate_host_name(host)?;
        let now = Utc::now().timestamp();
        let mut conn = self.lock_conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM value_store WHERE host = ?1", params![host])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO value_store (host, service, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (id, key, value) in store.entries() {
                stmt.execute(params![
                    host,
                    serde_json::to_string(id)?,
                    key,
                    serde_json::to_string(value)?,
                    now
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(host, services = store.len(), "Value store saved");
        Ok(())
    }

    fn remove_host(&self, host: &str) -> Result<()> {
        let conn = self.lock_conn();
        let removed = conn.execute("DELETE FROM value_store WHERE host = ?1", params![host])?;
        tracing::info!(host, removed, "Value store entries removed");
        Ok(())
    }
}
