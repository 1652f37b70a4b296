//! Versioned migration of persisted monitor records.
//!
//! Migrations work on the raw field map of each record rather than on
//! [`MonitorConfig`](status_core::models::MonitorConfig): records written by
//! older versions may not be representable in the current model until every
//! applicable migration has run.
//!
//! Applicability is decided once, against the version recorded before the
//! run. The selected migrations are applied to every record in definition
//! order, and the records plus a new version marker are committed in a single
//! transaction. If anything fails, nothing is written.

use std::fmt;

use serde_json::Value;
use status_core::models::MonitorStatus;

use crate::database::{Database, Document};
use crate::error::{Result, StoreError};
use crate::schema::{recorded_version, SchemaRecord, SchemaVersion};

/// One step of the migration chain.
#[derive(Clone, Copy)]
pub struct Migration {
    /// Short identifier used in logs and errors.
    pub name: &'static str,
    is_applicable: fn(&SchemaVersion) -> bool,
    action: fn(&mut Document),
}

impl Migration {
    pub const fn new(
        name: &'static str,
        is_applicable: fn(&SchemaVersion) -> bool,
        action: fn(&mut Document),
    ) -> Self {
        Self {
            name,
            is_applicable,
            action,
        }
    }

    pub fn is_applicable(&self, recorded: &SchemaVersion) -> bool {
        (self.is_applicable)(recorded)
    }

    pub fn apply(&self, record: &mut Document) {
        (self.action)(record)
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration").field("name", &self.name).finish()
    }
}

/// The migration chain, in the order it must be applied.
pub fn default_migrations() -> Vec<Migration> {
    vec![
        // V1.4.0 introduced per-player gear levels, shown by default.
        Migration::new(
            "enable_player_gear_level",
            |v| v.major == 1 && v.minor <= 3,
            |record| {
                record.insert("displayPlayerGearLevel".to_string(), Value::Bool(true));
            },
        ),
        // V1.5.0 introduced monitor status and the server description toggle.
        Migration::new(
            "add_status_and_server_description",
            |v| v.major == 1 && v.minor <= 4,
            |record| {
                record.insert(
                    "status".to_string(),
                    Value::String(MonitorStatus::Active.as_str().to_string()),
                );
                record.insert("displayServerDescription".to_string(), Value::Bool(true));
            },
        ),
        // Game servers stopped reporting gear levels in the server list. The
        // field stays in place (full-record replacement expects it) and is
        // switched off instead.
        Migration::new(
            "disable_player_gear_level",
            |v| v.major == 1 && v.minor <= 5,
            |record| {
                record.insert("displayPlayerGearLevel".to_string(), Value::Bool(false));
            },
        ),
    ]
}

/// Upgrades the records of a [`Database`] to the running application version.
#[derive(Debug)]
pub struct MigrationEngine<'a> {
    database: &'a Database,
    app_version: SchemaVersion,
    migrations: Vec<Migration>,
}

impl<'a> MigrationEngine<'a> {
    /// Engine with the [`default_migrations`] chain.
    pub fn new(database: &'a Database, app_version: SchemaVersion) -> Self {
        Self::with_migrations(database, app_version, default_migrations())
    }

    pub fn with_migrations(
        database: &'a Database,
        app_version: SchemaVersion,
        migrations: Vec<Migration>,
    ) -> Self {
        Self {
            database,
            app_version,
            migrations,
        }
    }

    /// Highest recorded marker, or [`SchemaVersion::BASELINE`] if none.
    pub fn current_schema_version(&self) -> Result<SchemaVersion> {
        Ok(recorded_version(&self.database.schema_records()?))
    }

    /// Migrations that apply when upgrading from `recorded`.
    ///
    /// Empty when `recorded` is already at or beyond the application version,
    /// so a chain never re-runs against data it has already upgraded.
    pub fn pending_migrations(&self, recorded: &SchemaVersion) -> Vec<&Migration> {
        if *recorded >= self.app_version {
            return Vec::new();
        }
        self.migrations
            .iter()
            .filter(|m| m.is_applicable(recorded))
            .collect()
    }

    /// Bring every monitor record up to the application version.
    ///
    /// Returns `true` if migrations ran (and a new marker was appended),
    /// `false` if there was nothing to do, in which case nothing is written.
    pub fn migrate_to_latest_version(&self) -> Result<bool> {
        let current = self.current_schema_version()?;
        if current > self.app_version {
            tracing::warn!(
                recorded = %current,
                running = %self.app_version,
                "data was written by a newer version; skipping migrations"
            );
        }

        let pending = self.pending_migrations(&current);
        if pending.is_empty() {
            tracing::info!("No migrations need to be performed.");
            return Ok(false);
        }

        tracing::info!(
            "Will migrate from V{} to V{} by performing {} migrations.",
            current,
            self.app_version,
            pending.len()
        );

        let migrated = self.database.transaction(|tx| {
            let ids = tx.record_ids();
            for id in &ids {
                let Some(record) = tx.record_mut(id) else {
                    continue;
                };
                let Value::Object(document) = record else {
                    return Err(StoreError::Migration {
                        migration: pending[0].name.to_string(),
                        record: id.clone(),
                        reason: "record is not an object".to_string(),
                    });
                };
                for migration in &pending {
                    migration.apply(document);
                    tracing::debug!(monitor_id = %id, migration = migration.name, "migration applied");
                }
            }
            tx.append_schema_record(SchemaRecord::new(self.app_version));
            Ok(ids.len())
        })?;

        tracing::info!(
            records = migrated,
            "Database migration from V{} to V{} was successful.",
            current,
            self.app_version
        );
        Ok(true)
    }
}
