// src/layouts.rs

//! Layout list: startup, installation toggles and shutdown
//!
//! Ties together reconciliation, the installed set queue and the download
//! policy for one host application session.

use crate::catalog::CatalogSource;
use crate::error::Result;
use crate::policy::{ConnectionMonitor, DownloadPolicy};
use crate::queue::{InstalledSet, InstalledSetQueue, MutationOutcome};
use crate::reconcile::{CatalogEntry, reconcile};
use crate::store::KeyValueStore;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub struct LayoutList<S, M> {
    entries: Vec<CatalogEntry>,
    needs_user_install: bool,
    queue: InstalledSetQueue,
    policy: DownloadPolicy<S, M>,
}

impl<S: KeyValueStore, M: ConnectionMonitor> LayoutList<S, M> {
    /// Reconcile the catalog with the store and start the installed set queue.
    ///
    /// Fails without side effects if either the catalog or the stored set
    /// cannot be loaded.
    pub async fn start<C: CatalogSource>(catalog: &C, store: Arc<S>, monitor: M) -> Result<Self> {
        let reconciliation = reconcile(catalog, store.as_ref()).await?;
        let needs_user_install = reconciliation.needs_user_install();

        if !needs_user_install {
            info!("All layouts are preloaded; nothing to install");
        }

        let queue = InstalledSetQueue::initialize(Arc::clone(&store), reconciliation.installed);
        let policy = DownloadPolicy::new(store, monitor);

        Ok(Self {
            entries: reconciliation.entries,
            needs_user_install,
            queue,
            policy,
        })
    }

    /// Catalog entries with `installed` reflecting the current in-memory set
    pub fn entries(&self) -> Vec<CatalogEntry> {
        let installed = self.queue.snapshot();
        self.entries
            .iter()
            .map(|entry| with_installed(entry, &installed))
            .collect()
    }

    pub fn entry(&self, id: &str) -> Option<CatalogEntry> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| with_installed(entry, &self.queue.snapshot()))
    }

    /// False when every catalog entry is preloaded
    pub fn needs_user_install(&self) -> bool {
        self.needs_user_install
    }

    pub fn set_layout_as_installed(&self, id: &str) -> MutationOutcome {
        self.warn_if_unknown(id);
        self.queue.install(id)
    }

    pub fn set_layout_as_uninstalled(&self, id: &str) -> MutationOutcome {
        self.warn_if_unknown(id);
        self.queue.uninstall(id)
    }

    pub fn installed(&self) -> InstalledSet {
        self.queue.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<InstalledSet> {
        self.queue.subscribe()
    }

    pub fn download_policy(&self) -> &DownloadPolicy<S, M> {
        &self.policy
    }

    /// Wait for queued mutations to settle and release the queue
    pub async fn stop(self) {
        self.queue.shutdown().await;
    }

    fn warn_if_unknown(&self, id: &str) {
        if !self.entries.iter().any(|entry| entry.id == id) {
            warn!(id = %id, "Layout is not in the catalog");
        }
    }
}

fn with_installed(entry: &CatalogEntry, installed: &InstalledSet) -> CatalogEntry {
    CatalogEntry {
        installed: entry.preloaded || installed.contains(&entry.id),
        ..entry.clone()
    }
}
