//! Typed access to the persisted monitor records.

use std::sync::Arc;

use serde_json::Value;
use status_core::models::MonitorConfig;

use crate::database::Database;
use crate::error::{Result, StoreError};

/// Record field names of [`MonitorConfig`] touched without decoding.
const DESTINATION_FIELD: &str = "destinationChannelId";
const ARTIFACT_FIELD: &str = "currentArtifactId";

/// Keyed collection of [`MonitorConfig`]s backed by a shared [`Database`].
///
/// Cloning is cheap; clones share the same database handle. Only use this
/// after the migration engine has brought the records up to date.
#[derive(Debug, Clone)]
pub struct MonitorStore {
    database: Arc<Database>,
}

impl MonitorStore {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// Insert `config`, or replace the stored record with the same id
    /// entirely. Repeating an identical put leaves one identical record.
    pub fn put(&self, config: &MonitorConfig) -> Result<()> {
        let record = encode(config)?;
        self.database.upsert_record(&config.id, record)?;
        tracing::debug!(monitor_id = %config.id, "monitor stored");
        Ok(())
    }

    /// Replace the stored record with `config` only if a record with that id
    /// still exists. Returns whether anything was written.
    pub fn update(&self, config: &MonitorConfig) -> Result<bool> {
        let record = encode(config)?;
        self.database.replace_record(&config.id, record)
    }

    /// Point monitor `id` at `artifact_id`, leaving every other field as
    /// currently stored.
    ///
    /// The record is re-read under the database lock, so changes made since
    /// the caller's snapshot survive. Returns `false` without writing when
    /// the monitor was removed or now targets a destination other than
    /// `destination_id`.
    pub fn set_artifact_id(&self, id: &str, destination_id: &str, artifact_id: &str) -> Result<bool> {
        self.database.transaction(|tx| {
            let same_destination = tx
                .record(id)
                .and_then(|record| record.get(DESTINATION_FIELD))
                .and_then(Value::as_str)
                .is_some_and(|current| current == destination_id);
            if !same_destination {
                return Ok(false);
            }

            if let Some(Value::Object(record)) = tx.record_mut(id) {
                record.insert(
                    ARTIFACT_FIELD.to_string(),
                    Value::String(artifact_id.to_string()),
                );
            }
            Ok(true)
        })
    }

    /// Delete the monitor with `id`. Returns `false` if there was none.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let removed = self.database.remove_record(id)?;
        if removed {
            tracing::debug!(monitor_id = %id, "monitor removed");
        }
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Result<Option<MonitorConfig>> {
        self.database
            .record(id)?
            .map(|record| decode(id, record))
            .transpose()
    }

    /// All monitors, in no guaranteed order.
    ///
    /// Records that no longer decode into [`MonitorConfig`] are logged and
    /// skipped so a single bad record cannot hide the others.
    pub fn list(&self) -> Result<Vec<MonitorConfig>> {
        let monitors = self
            .database
            .records()?
            .into_iter()
            .filter_map(|(id, record)| match decode(&id, record) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(monitor_id = %id, error = %e, "skipping undecodable monitor record");
                    None
                }
            })
            .collect();
        Ok(monitors)
    }

    /// Release the underlying database. See [`Database::close`].
    pub fn close(&self) -> bool {
        self.database.close()
    }
}

fn encode(config: &MonitorConfig) -> Result<Value> {
    if config.id.trim().is_empty() {
        return Err(StoreError::MissingId);
    }
    serde_json::to_value(config).map_err(StoreError::Encode)
}

fn decode(id: &str, record: Value) -> Result<MonitorConfig> {
    serde_json::from_value(record).map_err(|source| StoreError::Decode {
        id: id.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use status_core::models::MonitorStatus;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> MonitorStore {
        let db = Database::open(dir.path().join("monitors.json")).unwrap();
        MonitorStore::new(Arc::new(db))
    }

    fn monitor(id: &str) -> MonitorConfig {
        MonitorConfig {
            id: id.to_string(),
            host_name: "127.0.0.1".to_string(),
            query_port: 9877,
            destination_channel_id: "chan-1".to_string(),
            current_artifact_id: None,
            status: MonitorStatus::Active,
            display_player_gear_level: false,
            display_server_description: true,
        }
    }

    #[test]
    fn test_put_inserts_then_replaces() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.put(&monitor("a")).unwrap();
        let mut changed = monitor("a");
        changed.host_name = "example.org".to_string();
        changed.current_artifact_id = Some("msg-1".to_string());
        store.put(&changed).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all, vec![changed]);
    }

    #[test]
    fn test_put_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let config = monitor("a");

        store.put(&config).unwrap();
        store.put(&config).unwrap();

        assert_eq!(store.list().unwrap(), vec![config.clone()]);
        assert_eq!(store.get("a").unwrap(), Some(config));
    }

    #[test]
    fn test_put_replaces_without_merging_fields() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        // A stray legacy field must not survive a full replacement.
        store
            .database()
            .upsert_record("a", json!({"id": "a", "discordChannelId": "old"}))
            .unwrap();
        store.put(&monitor("a")).unwrap();

        let raw = store.database().record("a").unwrap().unwrap();
        assert!(raw.get("discordChannelId").is_none());
    }

    #[test]
    fn test_put_rejects_empty_id() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(store.put(&monitor(" ")), Err(StoreError::MissingId)));
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(!store.remove("nope").unwrap());

        store.put(&monitor("a")).unwrap();
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_update_does_not_resurrect_removed_monitor() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(!store.update(&monitor("gone")).unwrap());
        assert!(store.get("gone").unwrap().is_none());

        store.put(&monitor("a")).unwrap();
        let mut with_artifact = monitor("a");
        with_artifact.current_artifact_id = Some("msg-9".to_string());
        assert!(store.update(&with_artifact).unwrap());
        assert_eq!(
            store.get("a").unwrap().unwrap().current_artifact_id.as_deref(),
            Some("msg-9")
        );
    }

    #[test]
    fn test_set_artifact_id_keeps_concurrent_changes() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.put(&monitor("a")).unwrap();

        // Changed after the caller took its snapshot.
        let mut paused = monitor("a");
        paused.status = MonitorStatus::Inactive;
        paused.host_name = "example.org".to_string();
        store.put(&paused).unwrap();

        assert!(store.set_artifact_id("a", "chan-1", "msg-7").unwrap());

        let stored = store.get("a").unwrap().unwrap();
        assert_eq!(stored.status, MonitorStatus::Inactive);
        assert_eq!(stored.host_name, "example.org");
        assert_eq!(stored.current_artifact_id.as_deref(), Some("msg-7"));
    }

    #[test]
    fn test_set_artifact_id_skips_removed_or_moved_monitor() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(!store.set_artifact_id("gone", "chan-1", "msg-1").unwrap());
        assert!(store.get("gone").unwrap().is_none());

        let mut moved = monitor("a");
        moved.destination_channel_id = "chan-2".to_string();
        store.put(&moved).unwrap();
        let generation = store.database().generation();

        assert!(!store.set_artifact_id("a", "chan-1", "msg-1").unwrap());
        assert_eq!(store.get("a").unwrap(), Some(moved));
        assert_eq!(store.database().generation(), generation);
    }

    #[test]
    fn test_list_skips_undecodable_records() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.put(&monitor("good")).unwrap();
        store
            .database()
            .upsert_record("legacy", json!({"id": "legacy", "hostName": "h"}))
            .unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "good");
        assert!(matches!(store.get("legacy"), Err(StoreError::Decode { .. })));
    }

    #[test]
    fn test_operations_fail_after_close() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let clone = store.clone();

        assert!(store.close());
        assert!(!clone.close());
        assert!(matches!(clone.list(), Err(StoreError::Closed)));
        assert!(matches!(clone.put(&monitor("a")), Err(StoreError::Closed)));
    }
}
