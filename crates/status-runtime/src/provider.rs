//! Boundaries to the two external collaborators of the scheduler.
//!
//! [`ServerInfoProvider`] queries a game server; [`ArtifactChannel`] posts
//! and edits the rendered status on a chat platform. Concrete clients live
//! outside this workspace and implement these traits.

use std::time::Duration;

use async_trait::async_trait;
use status_core::models::{Player, RenderedStatus, RuleSet, ServerSummary};
use thiserror::Error;

/// Identifier of an artifact created by an [`ArtifactChannel`].
pub type ArtifactId = String;

/// Failure while querying a game server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure while creating or updating an artifact.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    /// The artifact no longer exists at the destination.
    #[error("artifact {0} not found")]
    NotFound(ArtifactId),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A resolved place artifacts can be posted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub id: String,
    /// Display name, when the platform reports one.
    pub name: Option<String>,
}

impl Destination {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// Queries game servers for their current state.
#[async_trait]
pub trait ServerInfoProvider: Send + Sync {
    async fn server_info(&self, host: &str, port: u16) -> Result<ServerSummary, ProviderError>;

    async fn player_list(&self, host: &str, port: u16) -> Result<Vec<Player>, ProviderError>;

    async fn rules(&self, host: &str, port: u16) -> Result<RuleSet, ProviderError>;
}

/// Posts rendered statuses to a chat platform.
#[async_trait]
pub trait ArtifactChannel: Send + Sync {
    /// Look up `destination_id`. `None` when it was deleted or is not
    /// accessible.
    async fn resolve(&self, destination_id: &str) -> Option<Destination>;

    /// Post a new artifact and return its id.
    async fn create(
        &self,
        destination: &Destination,
        content: &RenderedStatus,
    ) -> Result<ArtifactId, ArtifactError>;

    /// Replace the content of an existing artifact.
    ///
    /// Fails with [`ArtifactError::NotFound`] if `artifact_id` no longer
    /// resolves at `destination`.
    async fn update(
        &self,
        destination: &Destination,
        artifact_id: &str,
        content: &RenderedStatus,
    ) -> Result<(), ArtifactError>;
}
