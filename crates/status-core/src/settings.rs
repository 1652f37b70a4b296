use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::models::MonitorStatus;

/// Directory under the user's home holding the database and logs.
pub const APP_DIR_NAME: &str = ".status-monitor";

/// File name of the monitor database inside [`APP_DIR_NAME`].
pub const DATABASE_FILE_NAME: &str = "monitors.json";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Keeps game server status displays in sync with live server state
#[derive(Parser, Debug, Clone)]
#[command(
    name = "status-monitor",
    about = "Keeps game server status displays in sync with live server state",
    version
)]
pub struct Settings {
    /// Path of the monitor database file
    #[arg(long, env = "STATUS_MONITOR_DATABASE", global = true)]
    pub database_path: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", global = true, value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Administrative commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Upgrade persisted monitors to the current schema version
    Migrate,
    /// Register a new server status monitor
    Add(AddMonitorArgs),
    /// Change an existing monitor
    Update(UpdateMonitorArgs),
    /// Remove a monitor
    Remove {
        /// Monitor id
        id: String,
    },
    /// List all monitors
    List,
    /// Show the application and recorded schema versions
    Version,
}

/// Arguments for [`Command::Add`].
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AddMonitorArgs {
    /// Host name or address of the game server
    #[arg(long)]
    pub host: String,

    /// Query port of the game server
    #[arg(long)]
    pub port: u16,

    /// Destination channel id the status is posted to
    #[arg(long)]
    pub channel: String,

    /// Show each player's gear level
    #[arg(long)]
    pub display_gear_level: bool,

    /// Hide the server description
    #[arg(long)]
    pub hide_description: bool,
}

/// Arguments for [`Command::Update`]. Omitted options keep their value.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct UpdateMonitorArgs {
    /// Monitor id
    pub id: String,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub channel: Option<String>,

    /// ACTIVE or INACTIVE
    #[arg(long)]
    pub status: Option<MonitorStatus>,

    #[arg(long)]
    pub display_gear_level: Option<bool>,

    #[arg(long)]
    pub display_description: Option<bool>,
}

impl Settings {
    /// Database path, falling back to `~/.status-monitor/monitors.json`.
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    /// Effective log level after applying `--debug`.
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "DEBUG"
        } else {
            &self.log_level
        }
    }
}

/// `~/.status-monitor/`, or `./.status-monitor/` without a home directory.
pub fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Default location of the monitor database.
pub fn default_database_path() -> PathBuf {
    app_dir().join(DATABASE_FILE_NAME)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["status-monitor", "list"]);

        assert_eq!(settings.command, Command::List);
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.log_file.is_none());
        assert!(!settings.debug);
        assert_eq!(settings.effective_log_level(), "INFO");
    }

    #[test]
    fn test_settings_debug_overrides_log_level() {
        let settings = Settings::parse_from(["status-monitor", "--debug", "migrate"]);
        assert_eq!(settings.command, Command::Migrate);
        assert_eq!(settings.effective_log_level(), "DEBUG");
    }

    #[test]
    fn test_settings_explicit_database_path() {
        let settings =
            Settings::parse_from(["status-monitor", "list", "--database-path", "/tmp/db.json"]);
        assert_eq!(
            settings.resolved_database_path(),
            PathBuf::from("/tmp/db.json")
        );
    }

    #[test]
    fn test_default_database_path_file_name() {
        let path = default_database_path();
        assert!(path.ends_with(PathBuf::from(APP_DIR_NAME).join(DATABASE_FILE_NAME)));
    }

    #[test]
    fn test_add_command_parsing() {
        let settings = Settings::parse_from([
            "status-monitor",
            "add",
            "--host",
            "127.0.0.1",
            "--port",
            "9877",
            "--channel",
            "1234",
            "--display-gear-level",
        ]);
        let Command::Add(args) = settings.command else {
            panic!("expected add command");
        };
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 9877);
        assert_eq!(args.channel, "1234");
        assert!(args.display_gear_level);
        assert!(!args.hide_description);
    }

    #[test]
    fn test_update_command_parses_status() {
        let settings = Settings::parse_from([
            "status-monitor",
            "update",
            "abc",
            "--status",
            "inactive",
            "--display-description",
            "false",
        ]);
        let Command::Update(args) = settings.command else {
            panic!("expected update command");
        };
        assert_eq!(args.id, "abc");
        assert_eq!(args.status, Some(MonitorStatus::Inactive));
        assert_eq!(args.display_description, Some(false));
        assert!(args.host.is_none());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = Settings::try_parse_from([
            "status-monitor",
            "add",
            "--host",
            "h",
            "--port",
            "99999",
            "--channel",
            "c",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_remove_command_parsing() {
        let settings = Settings::parse_from(["status-monitor", "remove", "m-1"]);
        assert_eq!(
            settings.command,
            Command::Remove {
                id: "m-1".to_string()
            }
        );
    }
}
