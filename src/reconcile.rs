// src/reconcile.rs

//! Startup reconciliation of the catalog with the persisted installed set

use crate::catalog::{CatalogItem, CatalogSource};
use crate::error::Result;
use crate::queue::{INSTALLED_LAYOUTS_KEY, InstalledSet};
use crate::store::KeyValueStore;
use serde_json::Value;
use tracing::{info, warn};

/// A catalog item merged with installation state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: String,
    pub name: Option<String>,
    pub preloaded: bool,
    /// `preloaded` or present in the installed set
    pub installed: bool,
}

impl CatalogEntry {
    fn merge(item: CatalogItem, installed_set: &InstalledSet) -> Self {
        let installed = item.preloaded || installed_set.contains(&item.id);

        Self {
            id: item.id,
            name: item.name,
            preloaded: item.preloaded,
            installed,
        }
    }
}

/// Result of [`reconcile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Entries in catalog order
    pub entries: Vec<CatalogEntry>,
    /// Persisted installed set, the queue's initial state
    pub installed: InstalledSet,
}

impl Reconciliation {
    /// False when every entry is preloaded, i.e. there is nothing the user
    /// could install and per-layout UI can be skipped entirely.
    pub fn needs_user_install(&self) -> bool {
        self.entries.iter().any(|entry| !entry.preloaded)
    }
}

/// Load the catalog and the persisted installed set, and merge them.
///
/// Both loads run concurrently. Either failing fails the whole call.
pub async fn reconcile<C, S>(catalog: &C, store: &S) -> Result<Reconciliation>
where
    C: CatalogSource,
    S: KeyValueStore,
{
    let (items, stored) = tokio::try_join!(catalog.fetch(), store.get_item(INSTALLED_LAYOUTS_KEY))?;

    let installed = decode_installed_set(stored);
    let entries: Vec<CatalogEntry> = items
        .into_iter()
        .map(|item| CatalogEntry::merge(item, &installed))
        .collect();

    info!(
        "Reconciled {} catalog entries with {} installed layouts",
        entries.len(),
        installed.len()
    );

    Ok(Reconciliation { entries, installed })
}

/// Absent or malformed values decode to the empty set
fn decode_installed_set(stored: Option<Value>) -> InstalledSet {
    let Some(value) = stored else {
        return InstalledSet::new();
    };

    match serde_json::from_value::<Vec<String>>(value) {
        Ok(ids) => ids.into_iter().collect(),
        Err(e) => {
            warn!("Ignoring malformed {} value: {}", INSTALLED_LAYOUTS_KEY, e);
            InstalledSet::new()
        }
    }
}
