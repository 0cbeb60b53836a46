// src/db/mod.rs

//! Database layer for layoutkit
//!
//! This module handles all SQLite operations including:
//! - Database initialization and schema creation
//! - Connection management
//! - The SQLite-backed key-value preference store

pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use crate::store::KeyValueStore;
use models::Preference;
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Initialize a new layoutkit database at the specified path
///
/// Creates the database file and sets up the schema.
/// This is idempotent - calling it on an existing database is safe.
///
/// # Arguments
///
/// * `db_path` - Path where the database should be created
pub fn init(db_path: &str) -> Result<()> {
    debug!("Initializing database at: {}", db_path);

    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(db_path).parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::InitError(format!("Failed to create database directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    schema::migrate(&conn)?;

    info!("Database initialized successfully");
    Ok(())
}

/// Open an existing layoutkit database
///
/// # Arguments
///
/// * `db_path` - Path to the database file
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        return Err(Error::DatabaseNotFound(db_path.to_string()));
    }

    let conn = Connection::open(db_path)?;

    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    Ok(conn)
}

/// Key-value store persisted in the `preferences` table
///
/// SQLite calls are blocking, so each operation runs on the blocking
/// thread pool with exclusive access to the shared connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open an existing database and bring its schema up to date
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = open(db_path)?;
        schema::migrate(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Wrap an already-migrated connection
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// All stored preferences, ordered by key
    pub async fn entries(&self) -> Result<Vec<Preference>> {
        self.run(Preference::list_all).await
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| Error::Store("database connection lock poisoned".to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| Error::Store(format!("database task failed: {}", e)))?
    }
}

impl KeyValueStore for SqliteStore {
    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        let key = key.to_string();
        let preference = self.run(move |conn| Preference::find(conn, &key)).await?;

        Ok(preference.map(|p| p.value))
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<()> {
        let key = key.to_string();
        self.run(move |conn| Preference::upsert(conn, &key, &value)).await
    }

    async fn delete_item(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.run(move |conn| Preference::delete(conn, &key)).await
    }
}
