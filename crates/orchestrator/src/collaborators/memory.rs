use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use phasestream_core::{ArtifactKind, DemoStatus, IdentityProfile, IdentityRole, JobKind, Uid};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{CollaboratorError, DemoDirectory};

/// How many documents each seeding call writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedQuantities {
    pub posts: u32,
    pub photos: u32,
    pub conversations: u32,
    pub comments: u32,
    pub reactions: u32,
    pub notifications: u32,
}

impl Default for SeedQuantities {
    fn default() -> Self {
        Self {
            posts: 8,
            photos: 6,
            conversations: 3,
            comments: 12,
            reactions: 20,
            notifications: 5,
        }
    }
}

impl SeedQuantities {
    pub fn count_for(&self, kind: ArtifactKind) -> u32 {
        match kind {
            ArtifactKind::Profile => 1,
            ArtifactKind::Posts => self.posts,
            ArtifactKind::Photos => self.photos,
            ArtifactKind::Conversations => self.conversations,
            ArtifactKind::Comments => self.comments,
            ArtifactKind::Reactions => self.reactions,
            ArtifactKind::Notifications => self.notifications,
        }
    }
}

/// An identity created through the directory
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub profile: IdentityProfile,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct JobRecord {
    pub kind: JobKind,
    pub uid: Uid,
    pub triggered_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    identities: Vec<(Uid, IdentityRecord)>,
    links: Vec<(Uid, Uid)>,
    artifacts: HashMap<(Uid, ArtifactKind), u32>,
    jobs: Vec<JobRecord>,
}

impl DirectoryState {
    fn find_role(&self, role: IdentityRole) -> Option<&(Uid, IdentityRecord)> {
        self.identities
            .iter()
            .find(|(_, record)| record.profile.role == role)
    }

    fn contains(&self, uid: &Uid) -> bool {
        self.identities.iter().any(|(id, _)| id == uid)
    }
}

/// Process-local demo directory backing the server and CLI out of the box
#[derive(Clone, Default)]
pub struct MemoryDemoDirectory {
    state: Arc<RwLock<DirectoryState>>,
    quantities: SeedQuantities,
}

impl MemoryDemoDirectory {
    pub fn new(quantities: SeedQuantities) -> Self {
        Self {
            state: Arc::new(RwLock::new(DirectoryState::default())),
            quantities,
        }
    }

    pub async fn identity_count(&self) -> usize {
        self.state.read().await.identities.len()
    }

    /// Identities in creation order.
    pub async fn identities(&self) -> Vec<(Uid, IdentityRecord)> {
        self.state.read().await.identities.clone()
    }

    pub async fn link_count(&self) -> usize {
        self.state.read().await.links.len()
    }

    /// Total documents written across all identities and kinds.
    pub async fn artifact_total(&self) -> u32 {
        self.state.read().await.artifacts.values().sum()
    }

    pub async fn jobs(&self) -> Vec<JobRecord> {
        self.state.read().await.jobs.clone()
    }

    fn ensure_known(state: &DirectoryState, uid: &Uid) -> Result<(), CollaboratorError> {
        if state.contains(uid) {
            Ok(())
        } else {
            Err(CollaboratorError::new(format!("Unknown identity: {}", uid)))
        }
    }
}

#[async_trait]
impl DemoDirectory for MemoryDemoDirectory {
    async fn resolve_demo_status(&self) -> Result<DemoStatus, CollaboratorError> {
        let state = self.state.read().await;

        let Some((uid, _)) = state.find_role(IdentityRole::Primary) else {
            return Ok(DemoStatus::absent());
        };
        let mut status = DemoStatus::existing(uid.clone());
        if let Some((_, friend)) = state.find_role(IdentityRole::Friend) {
            status = status.with_friend(friend.profile.display_name.clone());
        }
        Ok(status)
    }

    async fn create_identity(&self, profile: &IdentityProfile) -> Result<Uid, CollaboratorError> {
        let mut state = self.state.write().await;

        if state
            .identities
            .iter()
            .any(|(_, record)| record.profile.email.eq_ignore_ascii_case(&profile.email))
        {
            return Err(CollaboratorError::new(format!(
                "An identity with email {} already exists",
                profile.email
            )));
        }

        let uid = Uid::new(Uuid::new_v4().simple().to_string());
        state.identities.push((
            uid.clone(),
            IdentityRecord {
                profile: profile.clone(),
                created_at: Utc::now(),
            },
        ));
        debug!(uid = %uid, role = profile.role.as_str(), "Identity created");
        Ok(uid)
    }

    async fn link_identities(
        &self,
        primary: &Uid,
        secondary: &Uid,
    ) -> Result<(), CollaboratorError> {
        let mut state = self.state.write().await;
        Self::ensure_known(&state, primary)?;
        Self::ensure_known(&state, secondary)?;

        let already_linked = state
            .links
            .iter()
            .any(|(a, b)| (a == primary && b == secondary) || (a == secondary && b == primary));
        if !already_linked {
            state.links.push((primary.clone(), secondary.clone()));
        }
        Ok(())
    }

    async fn seed_artifacts(
        &self,
        kind: ArtifactKind,
        primary: &Uid,
        secondary: Option<&Uid>,
    ) -> Result<u32, CollaboratorError> {
        let mut state = self.state.write().await;
        Self::ensure_known(&state, primary)?;
        match secondary {
            Some(secondary) => Self::ensure_known(&state, secondary)?,
            None if kind.needs_counterpart() => {
                return Err(CollaboratorError::new(format!(
                    "Seeding {} requires a second identity",
                    kind.as_str()
                )))
            }
            None => {}
        }

        let count = self.quantities.count_for(kind);
        *state.artifacts.entry((primary.clone(), kind)).or_insert(0) += count;
        Ok(count)
    }

    async fn trigger_downstream_job(
        &self,
        kind: JobKind,
        uid: &Uid,
    ) -> Result<(), CollaboratorError> {
        let mut state = self.state.write().await;
        Self::ensure_known(&state, uid)?;
        state.jobs.push(JobRecord {
            kind,
            uid: uid.clone(),
            triggered_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasestream_core::DemoProfiles;

    #[tokio::test]
    async fn test_status_tracks_identities() {
        let directory = MemoryDemoDirectory::default();
        let profiles = DemoProfiles::default();

        assert!(!directory.resolve_demo_status().await.unwrap().exists);

        let primary = directory.create_identity(&profiles.primary()).await.unwrap();
        let status = directory.resolve_demo_status().await.unwrap();
        assert!(status.exists);
        assert_eq!(status.uid, Some(primary));
        assert!(!status.friend_exists);

        directory.create_identity(&profiles.friend()).await.unwrap();
        let status = directory.resolve_demo_status().await.unwrap();
        assert!(status.friend_exists);
        assert_eq!(status.friend_display_name.as_deref(), Some("Sarah Chen"));
    }

    #[tokio::test]
    async fn test_identities_listed_in_creation_order() {
        let directory = MemoryDemoDirectory::default();
        let profiles = DemoProfiles::default();
        let before = Utc::now();

        let primary = directory.create_identity(&profiles.primary()).await.unwrap();
        let friend = directory.create_identity(&profiles.friend()).await.unwrap();

        let identities = directory.identities().await;
        assert_eq!(identities.len(), 2);
        assert_eq!(identities[0].0, primary);
        assert_eq!(identities[1].0, friend);
        assert_eq!(identities[1].1.profile.display_name, "Sarah Chen");
        assert!(identities[0].1.created_at >= before);
        assert!(identities[1].1.created_at >= identities[0].1.created_at);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let directory = MemoryDemoDirectory::default();
        let profile = DemoProfiles::default().primary();
        directory.create_identity(&profile).await.unwrap();
        let error = directory.create_identity(&profile).await.unwrap_err();
        assert!(error.message.contains("already exists"));
    }

    #[tokio::test]
    async fn test_seed_requires_counterpart() {
        let directory = MemoryDemoDirectory::default();
        let uid = directory
            .create_identity(&DemoProfiles::default().primary())
            .await
            .unwrap();

        let count = directory
            .seed_artifacts(ArtifactKind::Posts, &uid, None)
            .await
            .unwrap();
        assert_eq!(count, SeedQuantities::default().posts);

        assert!(directory
            .seed_artifacts(ArtifactKind::Conversations, &uid, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unknown_uid_rejected() {
        let directory = MemoryDemoDirectory::default();
        let ghost = Uid::new("ghost");
        assert!(directory
            .trigger_downstream_job(JobKind::FeedRebuild, &ghost)
            .await
            .is_err());
        assert!(directory.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_link_is_idempotent() {
        let directory = MemoryDemoDirectory::default();
        let profiles = DemoProfiles::default();
        let a = directory.create_identity(&profiles.primary()).await.unwrap();
        let b = directory.create_identity(&profiles.friend()).await.unwrap();
        directory.link_identities(&a, &b).await.unwrap();
        directory.link_identities(&b, &a).await.unwrap();
        assert_eq!(directory.link_count().await, 1);
    }
}
