// src/policy.rs

//! Download policy for metered connections
//!
//! Whether layout payloads may be downloaded while on a metered (charged)
//! data connection. The user's choice is stored as a boolean under
//! [`DOWNLOAD_ON_DATA_CONNECTION_KEY`]; no stored value means "ask".

use crate::error::{Error, Result};
use crate::store::KeyValueStore;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Store key holding the metered-download choice
pub const DOWNLOAD_ON_DATA_CONNECTION_KEY: &str = "download.prompt-on-data-connection";

/// User choice for downloads over a metered connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadPolicyState {
    /// Ask before downloading
    #[default]
    Prompt,
    Allow,
    Deny,
}

impl DownloadPolicyState {
    pub fn as_str(&self) -> &str {
        match self {
            DownloadPolicyState::Prompt => "prompt",
            DownloadPolicyState::Allow => "allow",
            DownloadPolicyState::Deny => "deny",
        }
    }

    /// Map a stored value to a state. Absence is `Prompt`.
    fn from_stored(value: Option<Value>) -> Self {
        match value {
            None => DownloadPolicyState::Prompt,
            Some(Value::Bool(true)) => DownloadPolicyState::Allow,
            Some(Value::Bool(false)) => DownloadPolicyState::Deny,
            Some(other) => {
                error!("Unknown download preference value: {}", other);
                DownloadPolicyState::Prompt
            }
        }
    }
}

impl FromStr for DownloadPolicyState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "prompt" => Ok(DownloadPolicyState::Prompt),
            "allow" => Ok(DownloadPolicyState::Allow),
            "deny" => Ok(DownloadPolicyState::Deny),
            _ => Err(Error::UnknownPolicyState(s.to_string())),
        }
    }
}

impl std::fmt::Display for DownloadPolicyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reports whether the active connection is metered (charged per byte).
///
/// Must not fail: an unavailable sensor reports `false`.
pub trait ConnectionMonitor: Send + Sync {
    fn is_metered(&self) -> bool;
}

impl<F> ConnectionMonitor for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_metered(&self) -> bool {
        self()
    }
}

/// Connection state known up front (e.g. from a CLI flag)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedConnection {
    pub metered: bool,
}

impl ConnectionMonitor for FixedConnection {
    fn is_metered(&self) -> bool {
        self.metered
    }
}

/// No connection sensor available; assumes no data charges
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownConnection;

impl ConnectionMonitor for UnknownConnection {
    fn is_metered(&self) -> bool {
        warn!("Connection type is not available. Assuming no data charges.");
        false
    }
}

/// Reads and writes the metered-download choice
pub struct DownloadPolicy<S, M> {
    store: Arc<S>,
    monitor: M,
}

impl<S: KeyValueStore, M: ConnectionMonitor> DownloadPolicy<S, M> {
    pub fn new(store: Arc<S>, monitor: M) -> Self {
        Self { store, monitor }
    }

    /// Effective state for a download starting now.
    ///
    /// Unmetered connections always allow without touching the store.
    /// Store failures are logged and read as `Prompt`.
    pub async fn get_current_state(&self) -> DownloadPolicyState {
        if !self.monitor.is_metered() {
            return DownloadPolicyState::Allow;
        }

        match self.store.get_item(DOWNLOAD_ON_DATA_CONNECTION_KEY).await {
            Ok(value) => DownloadPolicyState::from_stored(value),
            Err(e) => {
                error!("Failed to read download preference: {}", e);
                DownloadPolicyState::Prompt
            }
        }
    }

    /// Persist the user's choice. `Prompt` removes the stored value.
    pub async fn set_state(&self, state: DownloadPolicyState) -> Result<()> {
        debug!("Setting download policy to {}", state);

        match state {
            DownloadPolicyState::Prompt => {
                self.store.delete_item(DOWNLOAD_ON_DATA_CONNECTION_KEY).await
            }
            DownloadPolicyState::Allow => {
                self.store
                    .set_item(DOWNLOAD_ON_DATA_CONNECTION_KEY, Value::Bool(true))
                    .await
            }
            DownloadPolicyState::Deny => {
                self.store
                    .set_item(DOWNLOAD_ON_DATA_CONNECTION_KEY, Value::Bool(false))
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    const METERED: FixedConnection = FixedConnection { metered: true };

    struct UnreadableStore;

    impl KeyValueStore for UnreadableStore {
        async fn get_item(&self, _key: &str) -> Result<Option<Value>> {
            Err(Error::Store("read failed".to_string()))
        }

        async fn set_item(&self, _key: &str, _value: Value) -> Result<()> {
            Err(Error::Store("write failed".to_string()))
        }

        async fn delete_item(&self, _key: &str) -> Result<()> {
            Err(Error::Store("delete failed".to_string()))
        }
    }

    #[test]
    fn test_state_names() {
        for state in [
            DownloadPolicyState::Prompt,
            DownloadPolicyState::Allow,
            DownloadPolicyState::Deny,
        ] {
            assert_eq!(state.to_string().parse::<DownloadPolicyState>().unwrap(), state);
        }

        assert!(matches!(
            "sometimes".parse::<DownloadPolicyState>(),
            Err(Error::UnknownPolicyState(_))
        ));
    }

    #[tokio::test]
    async fn test_unmetered_always_allows() {
        let store = Arc::new(MemoryStore::with_items([(
            DOWNLOAD_ON_DATA_CONNECTION_KEY,
            json!(false),
        )]));
        let policy = DownloadPolicy::new(store, FixedConnection { metered: false });

        assert_eq!(policy.get_current_state().await, DownloadPolicyState::Allow);
    }

    #[tokio::test]
    async fn test_unmetered_does_not_read_store() {
        let policy = DownloadPolicy::new(Arc::new(UnreadableStore), UnknownConnection);
        assert_eq!(policy.get_current_state().await, DownloadPolicyState::Allow);
    }

    #[tokio::test]
    async fn test_metered_default_is_prompt() {
        let policy = DownloadPolicy::new(Arc::new(MemoryStore::new()), METERED);
        assert_eq!(policy.get_current_state().await, DownloadPolicyState::Prompt);
    }

    #[tokio::test]
    async fn test_set_state_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let policy = DownloadPolicy::new(Arc::clone(&store), METERED);

        policy.set_state(DownloadPolicyState::Allow).await.unwrap();
        assert_eq!(policy.get_current_state().await, DownloadPolicyState::Allow);
        assert_eq!(
            store.get_item(DOWNLOAD_ON_DATA_CONNECTION_KEY).await.unwrap(),
            Some(json!(true))
        );

        policy.set_state(DownloadPolicyState::Deny).await.unwrap();
        assert_eq!(policy.get_current_state().await, DownloadPolicyState::Deny);

        policy.set_state(DownloadPolicyState::Prompt).await.unwrap();
        assert_eq!(policy.get_current_state().await, DownloadPolicyState::Prompt);
        assert_eq!(store.get_item(DOWNLOAD_ON_DATA_CONNECTION_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_failure_falls_back_to_prompt() {
        let policy = DownloadPolicy::new(Arc::new(UnreadableStore), METERED);
        assert_eq!(policy.get_current_state().await, DownloadPolicyState::Prompt);
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let policy = DownloadPolicy::new(Arc::new(UnreadableStore), METERED);
        let result = policy.set_state(DownloadPolicyState::Deny).await;
        assert!(result.unwrap_err().is_store_error());
    }

    #[tokio::test]
    async fn test_unknown_stored_value_is_prompt() {
        let store = Arc::new(MemoryStore::with_items([(
            DOWNLOAD_ON_DATA_CONNECTION_KEY,
            json!("yes"),
        )]));
        let policy = DownloadPolicy::new(store, METERED);

        assert_eq!(policy.get_current_state().await, DownloadPolicyState::Prompt);
    }

    #[test]
    fn test_closure_monitor() {
        let monitor = || true;
        assert!(monitor.is_metered());
    }
}
