// src/queue.rs

//! Serialized mutation queue for the installed layout set
//!
//! The installed set is owned by a single worker task. Install and uninstall
//! requests are sent to it over an unbounded channel and applied strictly in
//! submission order:
//!
//! 1. the set is mutated in memory (optimistic apply),
//! 2. the whole set is written to the store under [`INSTALLED_LAYOUTS_KEY`]
//!    as a sorted JSON array (not submission order),
//! 3. on write failure the in-memory change is undone before the next
//!    request is dequeued. A store that panics mid-write counts as a
//!    failed write.
//!
//! Each request's outcome is delivered to its submitter through a oneshot
//! channel. A failed write only fails that request; the worker keeps going.
//!
//! The current set is published through a `watch` channel so readers see
//! optimistic changes and rollbacks as they happen.

use crate::error::{Error, Result};
use crate::store::KeyValueStore;
use serde_json::Value;
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Store key holding the installed layout ids as a JSON array of strings
pub const INSTALLED_LAYOUTS_KEY: &str = "layout.dynamic-installed";

/// Set of layout ids the user has explicitly installed
pub type InstalledSet = BTreeSet<String>;

/// Direction of a queued mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Install,
    Uninstall,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationKind::Install => write!(f, "install"),
            MutationKind::Uninstall => write!(f, "uninstall"),
        }
    }
}

/// An intent to add or remove one id from the installed set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    pub kind: MutationKind,
    pub id: String,
}

impl PendingMutation {
    pub fn install(id: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::Install,
            id: id.into(),
        }
    }

    pub fn uninstall(id: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::Uninstall,
            id: id.into(),
        }
    }

    /// Apply to `set`, returning whether the set changed.
    fn apply(&self, set: &mut InstalledSet) -> bool {
        match self.kind {
            MutationKind::Install => set.insert(self.id.clone()),
            MutationKind::Uninstall => set.remove(&self.id),
        }
    }

    /// Undo a previous `apply` that changed the set.
    fn revert(&self, set: &mut InstalledSet) {
        match self.kind {
            MutationKind::Install => {
                set.remove(&self.id);
            }
            MutationKind::Uninstall => {
                set.insert(self.id.clone());
            }
        }
    }
}

struct Job {
    mutation: PendingMutation,
    respond_to: oneshot::Sender<Result<()>>,
}

/// Completion of a submitted mutation.
///
/// The mutation is queued as soon as it is submitted; awaiting the outcome
/// is optional and does not affect ordering.
#[must_use = "dropping the outcome does not cancel the mutation, but its error is lost"]
pub struct MutationOutcome {
    receiver: oneshot::Receiver<Result<()>>,
}

impl Future for MutationOutcome {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Sender dropped without answering: the worker is gone
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::QueueClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Handle to the installed set and its mutation queue
pub struct InstalledSetQueue {
    sender: mpsc::UnboundedSender<Job>,
    installed: watch::Receiver<InstalledSet>,
    worker: JoinHandle<()>,
}

impl InstalledSetQueue {
    /// Take ownership of `initial_set` and start the worker.
    ///
    /// Nothing is written to the store until the first mutation.
    /// Must be called from within a Tokio runtime.
    pub fn initialize<S: KeyValueStore>(store: Arc<S>, initial_set: InstalledSet) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (publisher, installed) = watch::channel(initial_set);

        let worker = Worker {
            store,
            receiver,
            installed: publisher,
        };
        let worker = tokio::spawn(worker.run());

        Self {
            sender,
            installed,
            worker,
        }
    }

    /// Queue adding `id` to the installed set
    pub fn install(&self, id: impl Into<String>) -> MutationOutcome {
        self.submit(PendingMutation::install(id))
    }

    /// Queue removing `id` from the installed set
    pub fn uninstall(&self, id: impl Into<String>) -> MutationOutcome {
        self.submit(PendingMutation::uninstall(id))
    }

    /// Queue an arbitrary mutation
    pub fn submit(&self, mutation: PendingMutation) -> MutationOutcome {
        let (respond_to, receiver) = oneshot::channel();

        debug!(kind = %mutation.kind, id = %mutation.id, "Queueing mutation");

        // If the worker has stopped the job comes back and is dropped here,
        // which closes `receiver` and resolves the outcome to QueueClosed.
        let _ = self.sender.send(Job {
            mutation,
            respond_to,
        });

        MutationOutcome { receiver }
    }

    /// Copy of the current in-memory set
    pub fn snapshot(&self) -> InstalledSet {
        self.installed.borrow().clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.installed.borrow().contains(id)
    }

    /// Observe every change to the in-memory set, including rollbacks
    pub fn subscribe(&self) -> watch::Receiver<InstalledSet> {
        self.installed.clone()
    }

    /// Stop accepting mutations and wait for queued ones to settle
    pub async fn shutdown(self) {
        drop(self.sender);

        if let Err(e) = self.worker.await {
            error!("Installed set worker terminated abnormally: {}", e);
        }
    }
}

struct Worker<S> {
    store: Arc<S>,
    receiver: mpsc::UnboundedReceiver<Job>,
    installed: watch::Sender<InstalledSet>,
}

impl<S: KeyValueStore> Worker<S> {
    async fn run(mut self) {
        while let Some(job) = self.receiver.recv().await {
            let result = self.apply(&job.mutation).await;

            if let Err(e) = &result {
                error!(
                    kind = %job.mutation.kind,
                    id = %job.mutation.id,
                    "Failed to persist installed layouts: {}",
                    e
                );
            }

            // The submitter may have dropped its outcome
            let _ = job.respond_to.send(result);
        }

        debug!("Installed set queue closed");
    }

    async fn apply(&mut self, mutation: &PendingMutation) -> Result<()> {
        let changed = self.installed.send_if_modified(|set| mutation.apply(set));

        let ids: Vec<Value> = self
            .installed
            .borrow()
            .iter()
            .cloned()
            .map(Value::String)
            .collect();

        // Own task: a panicking store becomes a JoinError, not a dead worker
        let store = Arc::clone(&self.store);
        let write = tokio::spawn(async move {
            store.set_item(INSTALLED_LAYOUTS_KEY, Value::Array(ids)).await
        });
        let result = match write.await {
            Ok(result) => result,
            Err(e) => Err(Error::Store(format!("store write aborted: {}", e))),
        };

        match result {
            Ok(()) => {
                debug!(kind = %mutation.kind, id = %mutation.id, "Persisted installed layouts");
                Ok(())
            }
            Err(e) => {
                if changed {
                    self.installed.send_modify(|set| mutation.revert(set));
                }
                Err(e)
            }
        }
    }
}
