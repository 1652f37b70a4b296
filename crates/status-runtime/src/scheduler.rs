//! Periodic reconciliation of monitors with their status artifacts.
//!
//! [`ReconciliationScheduler`] runs in a dedicated tokio task. Each tick it
//! takes a snapshot of all monitors, queries every active monitor's server,
//! renders the result and creates or updates the monitor's artifact. When an
//! artifact has been deleted externally, the stale reference is dropped and a
//! new artifact is created in the same tick.
//!
//! The loop uses a fixed delay: the next tick starts `update_interval` after
//! the previous one finished, so ticks never overlap. Monitors are processed
//! one at a time, each in its own task, so an error or panic while handling
//! one monitor never prevents the rest of the tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use status_core::models::MonitorConfig;
use status_core::render::render_status;
use status_store::{MonitorStore, StoreError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::provider::{
    ArtifactChannel, ArtifactError, ArtifactId, Destination, ProviderError, ServerInfoProvider,
};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Delay between the end of one tick and the start of the next.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound for any single call to a collaborator.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ── Public types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub update_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Why a monitor was left alone for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The monitor is paused.
    Inactive,
    /// The destination was deleted or is not accessible.
    DestinationUnavailable,
}

/// Result of reconciling one monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// The existing artifact was refreshed; the store was not touched.
    Updated,
    /// The referenced artifact was gone and has been replaced.
    SelfHealed { artifact_id: ArtifactId },
    /// The monitor had no artifact and one was created.
    Created { artifact_id: ArtifactId },
    Skipped(SkipReason),
}

/// Failure while reconciling one monitor. Aborts that monitor for the
/// current tick only.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("failed to fetch {what} from {address}: {source}")]
    Fetch {
        what: &'static str,
        address: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to update artifact {artifact_id}: {source}")]
    Update {
        artifact_id: ArtifactId,
        #[source]
        source: ArtifactError,
    },

    #[error("failed to create artifact: {0}")]
    Create(#[source] ArtifactError),

    #[error("failed to persist artifact reference: {0}")]
    Persist(#[from] StoreError),
}

impl ReconcileError {
    /// Short name of the failed operation, for log fields.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Update { .. } => "update",
            Self::Create(_) => "create",
            Self::Persist(_) => "persist",
        }
    }
}

/// Per-outcome counts for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub updated: usize,
    pub created: usize,
    pub self_healed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl TickReport {
    fn record(&mut self, outcome: &MonitorOutcome) {
        match outcome {
            MonitorOutcome::Updated => self.updated += 1,
            MonitorOutcome::Created { .. } => self.created += 1,
            MonitorOutcome::SelfHealed { .. } => self.self_healed += 1,
            MonitorOutcome::Skipped(_) => self.skipped += 1,
        }
    }

    /// Number of monitors seen in the tick.
    pub fn total(&self) -> usize {
        self.updated + self.created + self.self_healed + self.skipped + self.failed
    }
}

// ── ReconciliationScheduler ───────────────────────────────────────────────────

/// Drives monitors towards their live server state.
///
/// Cloning is cheap; all collaborators are shared.
#[derive(Clone)]
pub struct ReconciliationScheduler {
    store: MonitorStore,
    provider: Arc<dyn ServerInfoProvider>,
    channel: Arc<dyn ArtifactChannel>,
    config: SchedulerConfig,
}

impl ReconciliationScheduler {
    pub fn new(
        store: MonitorStore,
        provider: Arc<dyn ServerInfoProvider>,
        channel: Arc<dyn ArtifactChannel>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            provider,
            channel,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Spawn the reconciliation loop.
    ///
    /// The first tick starts immediately. The store is released when the loop
    /// stops, whether through the returned handle or the token.
    pub fn start(self) -> SchedulerHandle {
        self.start_with_token(CancellationToken::new())
    }

    /// Like [`start`](Self::start), stopping when `cancel` is cancelled.
    pub fn start_with_token(self, cancel: CancellationToken) -> SchedulerHandle {
        let store = self.store.clone();
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            self.run(loop_cancel).await;
        });

        SchedulerHandle {
            cancel,
            handle: Some(handle),
            store,
        }
    }

    /// Reconcile every monitor once.
    ///
    /// Fails only when the monitor snapshot cannot be loaded; per-monitor
    /// failures are logged and counted in the report.
    pub async fn run_tick(&self) -> Result<TickReport, StoreError> {
        let monitors = self.store.list()?;
        let mut report = TickReport::default();

        for monitor in monitors {
            let monitor_id = monitor.id.clone();
            let scheduler = self.clone();
            let task = tokio::spawn(async move { scheduler.reconcile(monitor).await });

            match task.await {
                Ok(Ok(outcome)) => {
                    tracing::debug!(monitor_id = %monitor_id, ?outcome, "monitor reconciled");
                    report.record(&outcome);
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        monitor_id = %monitor_id,
                        operation = e.operation(),
                        error = %e,
                        "monitor reconciliation failed"
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::error!(monitor_id = %monitor_id, error = %e, "monitor reconciliation panicked");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Reconcile a single monitor.
    ///
    /// Writes to the store only when a new artifact was created, and then
    /// only the artifact reference; changes made to the monitor while the
    /// tick was running are kept.
    pub async fn reconcile(&self, monitor: MonitorConfig) -> Result<MonitorOutcome, ReconcileError> {
        if !monitor.is_active() {
            return Ok(MonitorOutcome::Skipped(SkipReason::Inactive));
        }

        let Some(destination) = self.resolve_destination(&monitor).await else {
            tracing::debug!(
                monitor_id = %monitor.id,
                destination = %monitor.destination_channel_id,
                "destination unavailable; skipping monitor"
            );
            return Ok(MonitorOutcome::Skipped(SkipReason::DestinationUnavailable));
        };

        let host = monitor.host_name.clone();
        let port = monitor.query_port;
        let summary = self
            .fetch("server info", &monitor, self.provider.server_info(&host, port))
            .await?;
        let players = self
            .fetch("player list", &monitor, self.provider.player_list(&host, port))
            .await?;
        let rules = self
            .fetch("rules", &monitor, self.provider.rules(&host, port))
            .await?;

        let content = render_status(&monitor, &summary, &players, &rules, Utc::now());

        let mut healed = false;
        if let Some(artifact_id) = monitor.current_artifact_id.clone() {
            let updated = self
                .artifact_call(self.channel.update(&destination, &artifact_id, &content))
                .await;
            match updated {
                Ok(()) => return Ok(MonitorOutcome::Updated),
                Err(ArtifactError::NotFound(_)) => {
                    tracing::info!(
                        monitor_id = %monitor.id,
                        artifact_id = %artifact_id,
                        "artifact no longer exists; creating a new one"
                    );
                    healed = true;
                }
                Err(source) => return Err(ReconcileError::Update { artifact_id, source }),
            }
        }

        let artifact_id = match self
            .artifact_call(self.channel.create(&destination, &content))
            .await
        {
            Ok(artifact_id) => artifact_id,
            Err(ArtifactError::Timeout(after)) => {
                // The platform may still have posted it; its id is unknown.
                tracing::warn!(
                    monitor_id = %monitor.id,
                    destination = %destination.id,
                    timeout_secs = after.as_secs(),
                    "artifact creation timed out; an untracked artifact may exist"
                );
                return Err(ReconcileError::Create(ArtifactError::Timeout(after)));
            }
            Err(source) => return Err(ReconcileError::Create(source)),
        };

        let stored = self.store.set_artifact_id(
            &monitor.id,
            &monitor.destination_channel_id,
            &artifact_id,
        )?;
        if !stored {
            tracing::debug!(
                monitor_id = %monitor.id,
                artifact_id = %artifact_id,
                "monitor removed or moved during reconciliation; reference not stored"
            );
        }

        Ok(if healed {
            MonitorOutcome::SelfHealed { artifact_id }
        } else {
            MonitorOutcome::Created { artifact_id }
        })
    }

    // ── Private implementation ────────────────────────────────────────────

    /// The main loop. Checks `cancel` before each tick and before sleeping;
    /// a tick in progress always runs to completion. Releases the store on
    /// exit.
    async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.update_interval.as_secs(),
            "reconciliation scheduler started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.run_tick().await {
                Ok(report) => tracing::debug!(
                    monitors = report.total(),
                    updated = report.updated,
                    created = report.created,
                    self_healed = report.self_healed,
                    skipped = report.skipped,
                    failed = report.failed,
                    "reconciliation tick finished"
                ),
                Err(e) => tracing::error!(error = %e, "reconciliation tick failed"),
            }

            if cancel.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.update_interval) => {}
            }
        }

        self.store.close();
        tracing::info!("reconciliation scheduler stopped");
    }

    async fn resolve_destination(&self, monitor: &MonitorConfig) -> Option<Destination> {
        let lookup = self.channel.resolve(&monitor.destination_channel_id);
        match tokio::time::timeout(self.config.request_timeout, lookup).await {
            Ok(destination) => destination,
            Err(_) => {
                tracing::warn!(
                    monitor_id = %monitor.id,
                    destination = %monitor.destination_channel_id,
                    "timed out resolving destination"
                );
                None
            }
        }
    }

    async fn fetch<T>(
        &self,
        what: &'static str,
        monitor: &MonitorConfig,
        request: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ReconcileError> {
        let timeout = self.config.request_timeout;
        let result = match tokio::time::timeout(timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout)),
        };
        result.map_err(|source| ReconcileError::Fetch {
            what,
            address: monitor.address(),
            source,
        })
    }

    async fn artifact_call<T>(
        &self,
        call: impl Future<Output = Result<T, ArtifactError>>,
    ) -> Result<T, ArtifactError> {
        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ArtifactError::Timeout(timeout)),
        }
    }
}

impl std::fmt::Debug for ReconciliationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationScheduler")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ── SchedulerHandle ───────────────────────────────────────────────────────────

/// Owner of a running reconciliation loop and of the store it writes to.
///
/// Call [`SchedulerHandle::shutdown`] to stop the loop and release the store.
/// Dropping the handle without shutting down cancels the loop; the loop
/// finishes its current tick and then releases the store itself.
#[derive(Debug)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    store: MonitorStore,
}

impl SchedulerHandle {
    /// Token observed by the loop; cancelling it stops further ticks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the loop and release the store.
    ///
    /// Waits for an in-flight tick to finish. The store is released even if
    /// the loop task panicked; the panic is then returned as an error.
    /// Releasing is idempotent, so a loop that already stopped is fine.
    pub async fn shutdown(mut self) -> status_core::Result<()> {
        self.cancel.cancel();

        let joined = match self.handle.take() {
            Some(handle) => handle.await,
            None => Ok(()),
        };

        self.store.close();

        joined.map_err(|e| {
            tracing::error!(error = %e, "reconciliation task ended abnormally");
            status_core::StatusError::Other(e.into())
        })
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if self.handle.is_some() {
            tracing::warn!("scheduler handle dropped without shutdown; stopping after the current tick");
            self.cancel.cancel();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
