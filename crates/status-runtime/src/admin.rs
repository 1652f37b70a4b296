//! Administrative operations on the monitor set.
//!
//! All calls are synchronous and take effect immediately; the scheduler sees
//! them on its next tick.

use status_core::models::{MonitorConfig, MonitorStatus};
use status_core::{Result, StatusError};
use status_store::MonitorStore;
use uuid::Uuid;

/// Input for [`MonitorAdmin::create_monitor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorDraft {
    pub host_name: String,
    pub query_port: u16,
    pub destination_channel_id: String,
}

/// Field changes for [`MonitorAdmin::update_monitor`]. `None` leaves the
/// field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorPatch {
    pub host_name: Option<String>,
    pub query_port: Option<u16>,
    pub destination_channel_id: Option<String>,
    pub status: Option<MonitorStatus>,
    pub display_player_gear_level: Option<bool>,
    pub display_server_description: Option<bool>,
}

impl MonitorPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct MonitorAdmin {
    store: MonitorStore,
}

impl MonitorAdmin {
    pub fn new(store: MonitorStore) -> Self {
        Self { store }
    }

    /// Insert or fully replace a monitor.
    pub fn put_monitor(&self, config: &MonitorConfig) -> Result<()> {
        validate(config)?;
        self.store.put(config)?;
        tracing::info!(monitor_id = %config.id, address = %config.address(), "monitor saved");
        Ok(())
    }

    /// Register a new monitor with default settings and a fresh id.
    ///
    /// The monitor starts active, without an artifact; the first tick
    /// creates one.
    pub fn create_monitor(&self, draft: MonitorDraft) -> Result<MonitorConfig> {
        let config = MonitorConfig {
            id: Uuid::new_v4().to_string(),
            host_name: draft.host_name.trim().to_string(),
            query_port: draft.query_port,
            destination_channel_id: draft.destination_channel_id.trim().to_string(),
            current_artifact_id: None,
            status: MonitorStatus::Active,
            display_player_gear_level: false,
            display_server_description: true,
        };
        self.put_monitor(&config)?;
        Ok(config)
    }

    /// Apply `patch` to an existing monitor.
    ///
    /// Moving a monitor to another destination drops its artifact reference,
    /// since the old artifact lives in the old destination.
    pub fn update_monitor(&self, id: &str, patch: MonitorPatch) -> Result<MonitorConfig> {
        let mut config = self
            .store
            .get(id)?
            .ok_or_else(|| StatusError::UnknownMonitor(id.to_string()))?;

        if let Some(host) = patch.host_name {
            config.host_name = host.trim().to_string();
        }
        if let Some(port) = patch.query_port {
            config.query_port = port;
        }
        if let Some(destination) = patch.destination_channel_id {
            let destination = destination.trim().to_string();
            if destination != config.destination_channel_id {
                config.destination_channel_id = destination;
                config.current_artifact_id = None;
            }
        }
        if let Some(status) = patch.status {
            config.status = status;
        }
        if let Some(gear_level) = patch.display_player_gear_level {
            config.display_player_gear_level = gear_level;
        }
        if let Some(description) = patch.display_server_description {
            config.display_server_description = description;
        }

        validate(&config)?;
        if !self.store.update(&config)? {
            return Err(StatusError::UnknownMonitor(id.to_string()));
        }
        tracing::info!(monitor_id = %id, "monitor updated");
        Ok(config)
    }

    /// Delete a monitor. Returns `false` if it did not exist.
    pub fn remove_monitor(&self, id: &str) -> Result<bool> {
        if id.trim().is_empty() {
            return Err(StatusError::InvalidMonitor("id must not be empty".to_string()));
        }
        let removed = self.store.remove(id)?;
        if removed {
            tracing::info!(monitor_id = %id, "monitor removed");
        }
        Ok(removed)
    }

    pub fn list_monitors(&self) -> Result<Vec<MonitorConfig>> {
        Ok(self.store.list()?)
    }

    pub fn get_monitor(&self, id: &str) -> Result<Option<MonitorConfig>> {
        Ok(self.store.get(id)?)
    }
}

fn validate(config: &MonitorConfig) -> Result<()> {
    let problem = if config.id.trim().is_empty() {
        "id must not be empty"
    } else if config.host_name.trim().is_empty() {
        "host name must not be empty"
    } else if config.query_port == 0 {
        "query port must not be 0"
    } else if config.destination_channel_id.trim().is_empty() {
        "destination channel must not be empty"
    } else {
        return Ok(());
    };
    Err(StatusError::InvalidMonitor(problem.to_string()))
}
