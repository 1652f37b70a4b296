//! Service startup: open the database, migrate it, then schedule.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use status_core::Result;
use status_store::{Database, MigrationEngine, MonitorStore, SchemaVersion};

use crate::admin::MonitorAdmin;
use crate::provider::{ArtifactChannel, ServerInfoProvider};
use crate::scheduler::{ReconciliationScheduler, SchedulerConfig, SchedulerHandle};

/// Startup options for the status service.
#[derive(Debug, Clone)]
pub struct StatusService {
    database_path: PathBuf,
    scheduler: SchedulerConfig,
    app_version: Option<SchemaVersion>,
}

impl StatusService {
    pub fn new(database_path: impl AsRef<Path>) -> Self {
        Self {
            database_path: database_path.as_ref().to_path_buf(),
            scheduler: SchedulerConfig::default(),
            app_version: None,
        }
    }

    pub fn with_scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    /// Migrate to `version` instead of the version of this build.
    pub fn with_app_version(mut self, version: SchemaVersion) -> Self {
        self.app_version = Some(version);
        self
    }

    /// Open and migrate the database, then start the scheduler.
    ///
    /// Migration completes before the first tick. If it fails nothing is
    /// written, the database is released and the error is returned.
    /// Must be called from within a tokio runtime.
    pub fn start(
        self,
        provider: Arc<dyn ServerInfoProvider>,
        channel: Arc<dyn ArtifactChannel>,
    ) -> Result<RunningService> {
        let app_version = match self.app_version {
            Some(version) => version,
            None => SchemaVersion::running()?,
        };

        let database = Database::open(&self.database_path)?;
        if let Err(e) = MigrationEngine::new(&database, app_version).migrate_to_latest_version() {
            tracing::error!(
                path = %self.database_path.display(),
                error = %e,
                "database migration failed; not starting"
            );
            database.close();
            return Err(e.into());
        }

        let store = MonitorStore::new(Arc::new(database));
        let scheduler = ReconciliationScheduler::new(store.clone(), provider, channel, self.scheduler)
            .start();
        tracing::info!(path = %self.database_path.display(), version = %app_version, "status service started");

        Ok(RunningService {
            admin: MonitorAdmin::new(store),
            scheduler,
        })
    }
}

/// A started service. Stop it with [`RunningService::shutdown`].
#[derive(Debug)]
pub struct RunningService {
    admin: MonitorAdmin,
    scheduler: SchedulerHandle,
}

impl RunningService {
    /// Administrative access to the monitors being scheduled.
    pub fn admin(&self) -> &MonitorAdmin {
        &self.admin
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    /// Stop scheduling and release the database.
    pub async fn shutdown(self) -> Result<()> {
        let result = self.scheduler.shutdown().await;
        tracing::info!("status service stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::MonitorDraft;
    use crate::provider::{ArtifactError, ArtifactId, Destination, ProviderError};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use status_core::models::{Player, RenderedStatus, RuleSet, ServerSummary};
    use status_core::StatusError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct EmptyServer;

    #[async_trait]
    impl ServerInfoProvider for EmptyServer {
        async fn server_info(&self, host: &str, _port: u16) -> std::result::Result<ServerSummary, ProviderError> {
            Ok(ServerSummary {
                name: host.to_string(),
                map: "Vardoran".to_string(),
                player_count: 0,
                max_players: 40,
                game_version: Some("1.0".to_string()),
            })
        }

        async fn player_list(&self, _host: &str, _port: u16) -> std::result::Result<Vec<Player>, ProviderError> {
            Ok(Vec::new())
        }

        async fn rules(&self, _host: &str, _port: u16) -> std::result::Result<RuleSet, ProviderError> {
            Ok(RuleSet::default())
        }
    }

    #[derive(Default)]
    struct CountingChannel {
        created: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactChannel for CountingChannel {
        async fn resolve(&self, destination_id: &str) -> Option<Destination> {
            Some(Destination::new(destination_id))
        }

        async fn create(
            &self,
            _destination: &Destination,
            _content: &RenderedStatus,
        ) -> std::result::Result<ArtifactId, ArtifactError> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            Ok(format!("artifact-{n}"))
        }

        async fn update(
            &self,
            _destination: &Destination,
            _artifact_id: &str,
            _content: &RenderedStatus,
        ) -> std::result::Result<(), ArtifactError> {
            Ok(())
        }
    }

    fn write_db(path: &Path, content: &Value) {
        std::fs::write(path, serde_json::to_string_pretty(content).unwrap()).unwrap();
    }

    fn read_db(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_migrates_before_scheduling() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitors.json");
        // A record written by 1.3.0: no status, no display toggles.
        write_db(
            &path,
            &json!({
                "monitors": {
                    "m1": {
                        "id": "m1",
                        "hostName": "203.0.113.7",
                        "queryPort": 9877,
                        "destinationChannelId": "chan-1"
                    }
                }
            }),
        );
        let channel = Arc::new(CountingChannel::default());

        let service = StatusService::new(&path)
            .with_app_version(SchemaVersion::new(1, 6, 0))
            .start(Arc::new(EmptyServer), channel.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let monitor = service.admin().get_monitor("m1").unwrap().unwrap();
        assert!(monitor.is_active());
        assert!(!monitor.display_player_gear_level);
        assert!(monitor.display_server_description);
        assert_eq!(monitor.current_artifact_id.as_deref(), Some("artifact-0"));
        assert_eq!(channel.created.load(Ordering::SeqCst), 1);

        service.shutdown().await.unwrap();

        let on_disk = read_db(&path);
        assert_eq!(on_disk["schema"], json!([{"version": "V1.6.0"}]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_migration_aborts_startup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitors.json");
        let original = json!({"monitors": {"bad": 42}});
        write_db(&path, &original);
        let channel = Arc::new(CountingChannel::default());

        let result = StatusService::new(&path)
            .with_app_version(SchemaVersion::new(1, 6, 0))
            .start(Arc::new(EmptyServer), channel.clone());

        assert!(matches!(result, Err(StatusError::Storage(_))));
        assert_eq!(read_db(&path), original);
        assert_eq!(channel.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitors_added_at_runtime_are_picked_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitors.json");
        let channel = Arc::new(CountingChannel::default());

        let service = StatusService::new(&path)
            .start(Arc::new(EmptyServer), channel.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(channel.created.load(Ordering::SeqCst), 0);

        let created = service
            .admin()
            .create_monitor(MonitorDraft {
                host_name: "203.0.113.7".to_string(),
                query_port: 9877,
                destination_channel_id: "chan-1".to_string(),
            })
            .unwrap();

        // Next tick starts one interval after the first finished.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(channel.created.load(Ordering::SeqCst), 1);
        let stored = service.admin().get_monitor(&created.id).unwrap().unwrap();
        assert!(stored.current_artifact_id.is_some());

        assert!(!service.is_finished());
        service.shutdown().await.unwrap();
    }
}
