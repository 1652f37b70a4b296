//! Schema versions and the persisted version markers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Version of the running application, used as the marker written after a
/// successful migration.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A `(major, minor, patch)` triple ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    /// Version assumed for a data set that carries no marker at all: the last
    /// release before markers were introduced.
    pub const BASELINE: SchemaVersion = SchemaVersion::new(1, 3, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Version of the running application.
    pub fn running() -> Result<Self> {
        APP_VERSION.parse()
    }

    /// Parse a persisted marker such as `"V1.6.0"`. The `V` prefix is
    /// mandatory.
    pub fn parse_marker(marker: &str) -> Result<Self> {
        let rest = marker
            .strip_prefix('V')
            .ok_or_else(|| StoreError::InvalidVersion(marker.to_string()))?;
        parse_triple(rest).ok_or_else(|| StoreError::InvalidVersion(marker.to_string()))
    }

    /// Persisted marker form, e.g. `"V1.6.0"`.
    pub fn marker(&self) -> String {
        format!("V{self}")
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SchemaVersion {
    type Err = StoreError;

    /// Parse an application version with an optional `V`/`v` prefix.
    /// Pre-release and build suffixes (`-SNAPSHOT`, `+abc`) are ignored.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let unprefixed = trimmed
            .strip_prefix('V')
            .or_else(|| trimmed.strip_prefix('v'))
            .unwrap_or(trimmed);
        let core = unprefixed
            .split(|c: char| c == '-' || c == '+')
            .next()
            .unwrap_or_default();
        parse_triple(core).ok_or_else(|| StoreError::InvalidVersion(s.to_string()))
    }
}

fn parse_triple(s: &str) -> Option<SchemaVersion> {
    let mut parts = s.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(SchemaVersion::new(major, minor, patch))
}

/// One persisted version marker, appended after each successful migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRecord {
    /// Marker string, e.g. `"V1.6.0"`.
    pub version: String,
}

impl SchemaRecord {
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            version: version.marker(),
        }
    }

    /// Parse the stored marker.
    pub fn schema_version(&self) -> Result<SchemaVersion> {
        SchemaVersion::parse_marker(&self.version)
    }
}

/// Highest version among `records`, or [`SchemaVersion::BASELINE`] when no
/// record parses. Malformed markers are logged and ignored.
pub fn recorded_version(records: &[SchemaRecord]) -> SchemaVersion {
    records
        .iter()
        .filter_map(|record| match record.schema_version() {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::warn!(error = %e, marker = %record.version, "ignoring malformed schema marker");
                None
            }
        })
        .max()
        .unwrap_or(SchemaVersion::BASELINE)
}
