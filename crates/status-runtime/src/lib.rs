//! Runtime layer of the server status monitor.
//!
//! Defines the collaborator boundaries ([`provider`]), the periodic
//! [`scheduler`] that keeps status artifacts in sync with live servers, the
//! [`admin`] interface for managing monitors and the [`service`] startup
//! sequence tying them together.

pub mod admin;
pub mod provider;
pub mod scheduler;
pub mod service;

pub use admin::{MonitorAdmin, MonitorDraft, MonitorPatch};
pub use provider::{
    ArtifactChannel, ArtifactError, ArtifactId, Destination, ProviderError, ServerInfoProvider,
};
pub use scheduler::{
    MonitorOutcome, ReconcileError, ReconciliationScheduler, SchedulerConfig, SchedulerHandle,
    SkipReason, TickReport,
};
pub use service::{RunningService, StatusService};

pub use status_core as core;
pub use status_store as store;
