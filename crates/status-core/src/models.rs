use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StatusError;

/// Whether a monitor is currently being reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorStatus {
    /// Polled and rendered on every tick.
    #[default]
    Active,
    /// Paused; the scheduler leaves the monitor and its artifact untouched.
    Inactive,
}

impl MonitorStatus {
    /// Persisted spelling of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MonitorStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            _ => Err(StatusError::InvalidStatus(s.to_string())),
        }
    }
}

/// Configuration and runtime state of a single monitored server.
///
/// Persisted as a camelCase document keyed by [`MonitorConfig::id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    /// Opaque unique identifier, assigned at creation and never changed.
    pub id: String,
    /// Host name or address of the game server.
    pub host_name: String,
    /// Query port of the game server.
    pub query_port: u16,
    /// Where the status artifact is posted.
    pub destination_channel_id: String,
    /// Last artifact created for this monitor; `None` means none exists yet.
    #[serde(default)]
    pub current_artifact_id: Option<String>,
    /// Whether the monitor is reconciled.
    pub status: MonitorStatus,
    /// Show each online player's gear level.
    pub display_player_gear_level: bool,
    /// Show the server description assembled from its rules.
    pub display_server_description: bool,
}

impl MonitorConfig {
    /// `host:port` as shown to users and used in log fields.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host_name, self.query_port)
    }

    /// `true` when the scheduler should reconcile this monitor.
    pub fn is_active(&self) -> bool {
        self.status == MonitorStatus::Active
    }
}

/// Summary information reported by a game server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    /// Advertised server name.
    pub name: String,
    /// Current map.
    pub map: String,
    /// Number of players online.
    pub player_count: u32,
    /// Player slots.
    pub max_players: u32,
    /// Game build, when the server reports one.
    #[serde(default)]
    pub game_version: Option<String>,
}

/// A player currently connected to a game server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub name: String,
    /// Score as reported by the server; shown as the player's gear level.
    pub score: i32,
    /// Seconds connected.
    pub duration_secs: u64,
}

/// Rule key/value pairs reported by a game server, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(pub BTreeMap<String, String>);

impl RuleSet {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RuleSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One labelled value inside a [`RenderedStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusField {
    pub name: String,
    pub value: String,
    /// Whether the field may share a row with its neighbours.
    pub inline: bool,
}

/// Platform-neutral rendering of a server's state, handed to the artifact
/// channel for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedStatus {
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<StatusField>,
    /// When the underlying data was fetched.
    pub timestamp: DateTime<Utc>,
}

impl RenderedStatus {
    /// Look up a field value by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}
