//! Persistence layer for the server status monitor.
//!
//! Provides the file-backed document [`database`], typed access to monitor
//! records through [`monitor_store::MonitorStore`], schema version markers
//! and the [`migration`] engine that upgrades records written by older
//! versions.

pub mod database;
pub mod error;
pub mod migration;
pub mod monitor_store;
pub mod schema;

pub use database::Database;
pub use error::{Result, StoreError};
pub use migration::MigrationEngine;
pub use monitor_store::MonitorStore;
pub use schema::{SchemaRecord, SchemaVersion};

pub use status_core as core;
