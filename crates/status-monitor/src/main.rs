mod bootstrap;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use status_core::models::MonitorConfig;
use status_core::settings::{AddMonitorArgs, Command, Settings, UpdateMonitorArgs};
use status_runtime::{MonitorAdmin, MonitorDraft, MonitorPatch};
use status_store::schema::APP_VERSION;
use status_store::{Database, MigrationEngine, MonitorStore, SchemaVersion};

fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(settings.effective_log_level(), settings.log_file.as_deref())?;

    let path = settings.resolved_database_path();
    tracing::debug!(path = %path.display(), "status-monitor v{} starting", APP_VERSION);

    let database = Arc::new(
        Database::open(&path)
            .with_context(|| format!("failed to open database at {}", path.display()))?,
    );

    let result = run(&settings.command, &database);
    database.close();
    result
}

fn run(command: &Command, database: &Arc<Database>) -> Result<()> {
    let app_version = SchemaVersion::running()?;
    let engine = MigrationEngine::new(database, app_version);

    if let Command::Version = command {
        println!("status-monitor {}", app_version);
        println!("schema {}", engine.current_schema_version()?);
        return Ok(());
    }

    // Records must be current before anything decodes them.
    let migrated = engine
        .migrate_to_latest_version()
        .context("database migration failed")?;

    let admin = MonitorAdmin::new(MonitorStore::new(Arc::clone(database)));

    match command {
        Command::Migrate => {
            if migrated {
                println!("Migrated database to {}", app_version.marker());
            } else {
                println!("Database is up to date ({})", app_version.marker());
            }
        }
        Command::Add(args) => {
            let config = add_monitor(&admin, args)?;
            println!("Added {}", describe(&config));
        }
        Command::Update(args) => {
            let patch = patch_from_args(args);
            if patch.is_empty() {
                anyhow::bail!("nothing to update for monitor {}", args.id);
            }
            let config = admin.update_monitor(&args.id, patch)?;
            println!("Updated {}", describe(&config));
        }
        Command::Remove { id } => {
            if admin.remove_monitor(id)? {
                println!("Removed monitor {}", id);
            } else {
                println!("No monitor with id {}", id);
            }
        }
        Command::List => {
            let monitors = admin.list_monitors()?;
            if monitors.is_empty() {
                println!("No monitors configured");
            }
            for config in &monitors {
                println!("{}", describe(config));
            }
        }
        // Reported above without migrating.
        Command::Version => {}
    }

    Ok(())
}

fn add_monitor(admin: &MonitorAdmin, args: &AddMonitorArgs) -> Result<MonitorConfig> {
    let mut config = admin.create_monitor(MonitorDraft {
        host_name: args.host.clone(),
        query_port: args.port,
        destination_channel_id: args.channel.clone(),
    })?;

    if args.display_gear_level || args.hide_description {
        config.display_player_gear_level = args.display_gear_level;
        config.display_server_description = !args.hide_description;
        admin.put_monitor(&config)?;
    }
    Ok(config)
}

fn patch_from_args(args: &UpdateMonitorArgs) -> MonitorPatch {
    MonitorPatch {
        host_name: args.host.clone(),
        query_port: args.port,
        destination_channel_id: args.channel.clone(),
        status: args.status,
        display_player_gear_level: args.display_gear_level,
        display_server_description: args.display_description,
    }
}

/// One-line summary used by the `add`, `update` and `list` commands.
fn describe(config: &MonitorConfig) -> String {
    format!(
        "{}  {}  channel={}  status={}  artifact={}",
        config.id,
        config.address(),
        config.destination_channel_id,
        config.status,
        config.current_artifact_id.as_deref().unwrap_or("-"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use status_core::models::MonitorStatus;
    use tempfile::TempDir;

    fn admin_in(dir: &TempDir) -> MonitorAdmin {
        let db = Database::open(dir.path().join("monitors.json")).unwrap();
        MonitorAdmin::new(MonitorStore::new(Arc::new(db)))
    }

    #[test]
    fn test_add_monitor_applies_flags() {
        let dir = TempDir::new().unwrap();
        let admin = admin_in(&dir);

        let config = add_monitor(
            &admin,
            &AddMonitorArgs {
                host: "203.0.113.7".to_string(),
                port: 9877,
                channel: "chan-1".to_string(),
                display_gear_level: true,
                hide_description: true,
            },
        )
        .unwrap();

        assert!(config.display_player_gear_level);
        assert!(!config.display_server_description);
        assert_eq!(admin.get_monitor(&config.id).unwrap(), Some(config));
    }

    #[test]
    fn test_patch_from_args() {
        let args = UpdateMonitorArgs {
            id: "m1".to_string(),
            host: None,
            port: Some(27015),
            channel: None,
            status: Some(MonitorStatus::Inactive),
            display_gear_level: None,
            display_description: Some(false),
        };

        let patch = patch_from_args(&args);

        assert_eq!(patch.query_port, Some(27015));
        assert_eq!(patch.status, Some(MonitorStatus::Inactive));
        assert_eq!(patch.display_server_description, Some(false));
        assert!(patch.host_name.is_none());
    }

    #[test]
    fn test_describe() {
        let config = MonitorConfig {
            id: "m1".to_string(),
            host_name: "203.0.113.7".to_string(),
            query_port: 9877,
            destination_channel_id: "chan-1".to_string(),
            current_artifact_id: None,
            status: MonitorStatus::Active,
            display_player_gear_level: false,
            display_server_description: true,
        };
        assert_eq!(
            describe(&config),
            "m1  203.0.113.7:9877  channel=chan-1  status=ACTIVE  artifact=-"
        );
    }

    #[test]
    fn test_run_migrates_legacy_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitors.json");
        std::fs::write(
            &path,
            r#"{"monitors":{"m1":{"id":"m1","hostName":"h","queryPort":1,"destinationChannelId":"c"}}}"#,
        )
        .unwrap();
        let database = Arc::new(Database::open(&path).unwrap());

        run(&Command::List, &database).unwrap();

        let engine = MigrationEngine::new(&database, SchemaVersion::running().unwrap());
        assert_eq!(
            engine.current_schema_version().unwrap(),
            SchemaVersion::running().unwrap()
        );
        let store = MonitorStore::new(Arc::clone(&database));
        assert!(store.get("m1").unwrap().unwrap().is_active());
    }
}
