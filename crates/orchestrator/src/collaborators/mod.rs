//! External collaborators consumed by the demo pipelines.
//!
//! Every call is an opaque external operation that either returns a result or
//! fails with a message. Pipelines receive an implementation at construction,
//! so tests substitute fakes.

mod memory;

use async_trait::async_trait;
use phasestream_core::{ArtifactKind, DemoStatus, IdentityProfile, JobKind, Uid};
use thiserror::Error;

pub use memory::{IdentityRecord, JobRecord, MemoryDemoDirectory, SeedQuantities};

/// Failure reported by an external collaborator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CollaboratorError {
    pub message: String,
}

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Identity provider and document store operations used for demo seeding
#[async_trait]
pub trait DemoDirectory: Send + Sync {
    /// Report whether the demo identities already exist.
    async fn resolve_demo_status(&self) -> Result<DemoStatus, CollaboratorError>;

    /// Create an identity and return its uid.
    async fn create_identity(&self, profile: &IdentityProfile) -> Result<Uid, CollaboratorError>;

    /// Connect two identities (e.g. as friends).
    async fn link_identities(&self, primary: &Uid, secondary: &Uid)
        -> Result<(), CollaboratorError>;

    /// Write demo content owned by `primary`, optionally involving `secondary`.
    /// Returns the number of documents written.
    async fn seed_artifacts(
        &self,
        kind: ArtifactKind,
        primary: &Uid,
        secondary: Option<&Uid>,
    ) -> Result<u32, CollaboratorError>;

    /// Kick off a downstream job for `uid` without waiting for it to finish.
    async fn trigger_downstream_job(&self, kind: JobKind, uid: &Uid)
        -> Result<(), CollaboratorError>;
}
