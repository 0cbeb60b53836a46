// src/store/mod.rs

//! Key-value persistence contract
//!
//! Every persisted setting is a JSON value stored under a string key.
//! Absence of a key is a meaningful state (see the download policy), so
//! reads return `Option` and deletion is distinct from overwriting.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

/// Async key-value store holding JSON values.
///
/// Implementations only need to be safe for a single logical writer per
/// key; ordering of writes is the caller's responsibility.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read the value stored under `key`, `None` when absent.
    fn get_item(&self, key: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: Value) -> impl Future<Output = Result<()>> + Send;

    /// Remove `key`. Removing an absent key succeeds.
    fn delete_item(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// In-memory store for ephemeral sessions and tests. Never fails.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `items`.
    pub fn with_items<I, K>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            items: Mutex::new(items.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>> {
        self.items
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<()> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete_item(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
