// src/config.rs

//! Runtime configuration
//!
//! There is no configuration file: all state lives in the database and
//! options come from command-line flags with these defaults.

use crate::catalog::CatalogLocation;
use crate::db::SqliteStore;
use crate::error::Result;
use crate::policy::{ConnectionMonitor, FixedConnection, UnknownConnection};

/// Default database path
pub const DEFAULT_DB_PATH: &str = "/var/lib/layoutkit/layoutkit.db";

/// Default catalog location, generated alongside the host application
pub const DEFAULT_CATALOG: &str = "./layouts.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: String,
    pub catalog: CatalogLocation,
    /// `None` when the connection type cannot be determined
    pub metered: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            catalog: CatalogLocation::parse(DEFAULT_CATALOG),
            metered: None,
        }
    }
}

impl Config {
    /// Open the configured database
    pub fn open_store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.db_path)
    }

    /// Connection monitor for the configured metered flag
    pub fn connection_monitor(&self) -> Connection {
        match self.metered {
            Some(metered) => Connection::Fixed(FixedConnection { metered }),
            None => Connection::Unknown(UnknownConnection),
        }
    }
}

/// Connection monitor selected by configuration
#[derive(Debug, Clone, Copy)]
pub enum Connection {
    Fixed(FixedConnection),
    Unknown(UnknownConnection),
}

impl ConnectionMonitor for Connection {
    fn is_metered(&self) -> bool {
        match self {
            Connection::Fixed(monitor) => monitor.is_metered(),
            Connection::Unknown(monitor) => monitor.is_metered(),
        }
    }
}
