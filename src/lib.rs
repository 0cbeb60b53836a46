// src/lib.rs

//! Layoutkit
//!
//! Manages which optional layouts a host application has installed.
//!
//! # Architecture
//!
//! - Catalog: static list of available layouts, some preloaded
//! - Reconciliation: one-time merge of the catalog with the persisted installed set
//! - Installed set queue: ordered install/uninstall mutations, each persisted
//!   before the next starts, rolled back in memory when persistence fails
//! - Download policy: prompt/allow/deny for downloads over metered connections
//! - Storage: key-value preferences, SQLite-backed in production

pub mod catalog;
pub mod config;
pub mod db;
mod error;
pub mod layouts;
pub mod policy;
pub mod queue;
pub mod reconcile;
pub mod store;

pub use error::{Error, Result};
