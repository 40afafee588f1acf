use log::{debug, warn};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Failed to encode or decode stored document `{key}`: {source}")]
    DocumentError {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Local document store: each key holds one versioned JSON document
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;

        let db = Database { conn };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Private, throwaway database
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let db = Database {
            conn: Connection::open_in_memory()?,
        };
        db.initialize_schema()?;
        Ok(db)
    }

    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key             TEXT PRIMARY KEY,
                version         INTEGER NOT NULL,
                value           TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Load the document stored under `key`.
    ///
    /// Returns `None` when nothing is stored or when the stored document was
    /// written with a different schema `version`.
    pub fn load<T: DeserializeOwned>(
        &self,
        key: &str,
        version: u32,
    ) -> Result<Option<T>, DatabaseError> {
        let row: Option<(u32, String)> = self
            .conn
            .query_row(
                "SELECT version, value FROM kv_store WHERE key = ?1",
                rusqlite::params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((stored_version, value)) = row else {
            debug!("event=document_missing key={}", key);
            return Ok(None);
        };

        if stored_version != version {
            warn!(
                "event=document_version_mismatch key={} stored={} expected={}",
                key, stored_version, version
            );
            return Ok(None);
        }

        serde_json::from_str(&value)
            .map(Some)
            .map_err(|source| DatabaseError::DocumentError {
                key: key.to_string(),
                source,
            })
    }

    /// Write `document` under `key`, replacing any previous value
    pub fn save<T: Serialize>(
        &self,
        key: &str,
        version: u32,
        document: &T,
    ) -> Result<(), DatabaseError> {
        let value = serde_json::to_string(document).map_err(|source| DatabaseError::DocumentError {
            key: key.to_string(),
            source,
        })?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO kv_store (key, version, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                version = excluded.version,
                value = excluded.value,
                updated_at = excluded.updated_at",
            rusqlite::params![
                key,
                version,
                value,
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
            ],
        )?;
        tx.commit()?;
        debug!("event=document_saved key={} bytes={}", key, value.len());
        Ok(())
    }
}
