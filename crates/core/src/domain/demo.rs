use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Opaque identity id issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of the demo environment as reported by the directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DemoStatus {
    pub exists: bool,
    pub uid: Option<Uid>,
    #[serde(default)]
    pub friend_exists: bool,
    pub friend_display_name: Option<String>,
}

impl DemoStatus {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn existing(uid: Uid) -> Self {
        Self {
            exists: true,
            uid: Some(uid),
            ..Self::default()
        }
    }

    pub fn with_friend(mut self, display_name: impl Into<String>) -> Self {
        self.friend_exists = true;
        self.friend_display_name = Some(display_name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IdentityRole {
    Primary,
    Friend,
}

impl IdentityRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "demo",
            Self::Friend => "friend",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IdentityProfile {
    pub role: IdentityRole,
    pub display_name: String,
    pub email: String,
}

impl IdentityProfile {
    pub fn new(
        role: IdentityRole,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            role,
            display_name: display_name.into(),
            email: email.into(),
        }
    }
}

/// Display names and emails for the two demo identities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoProfiles {
    pub primary_display_name: String,
    pub primary_email: String,
    pub friend_display_name: String,
    pub friend_email: String,
}

impl Default for DemoProfiles {
    fn default() -> Self {
        Self {
            primary_display_name: "Alex Rivera".to_string(),
            primary_email: "demo@phasestream.dev".to_string(),
            friend_display_name: "Sarah Chen".to_string(),
            friend_email: "demo-friend@phasestream.dev".to_string(),
        }
    }
}

impl DemoProfiles {
    pub fn primary(&self) -> IdentityProfile {
        IdentityProfile::new(
            IdentityRole::Primary,
            &self.primary_display_name,
            &self.primary_email,
        )
    }

    pub fn friend(&self) -> IdentityProfile {
        IdentityProfile::new(
            IdentityRole::Friend,
            &self.friend_display_name,
            &self.friend_email,
        )
    }

    pub fn profile(&self, role: IdentityRole) -> IdentityProfile {
        match role {
            IdentityRole::Primary => self.primary(),
            IdentityRole::Friend => self.friend(),
        }
    }
}

/// Kinds of demo content written by the seeding phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Profile,
    Posts,
    Photos,
    Conversations,
    Comments,
    Reactions,
    Notifications,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Posts => "posts",
            Self::Photos => "photos",
            Self::Conversations => "conversations",
            Self::Comments => "comments",
            Self::Reactions => "reactions",
            Self::Notifications => "notifications",
        }
    }

    /// Whether seeding this kind involves a second identity.
    pub fn needs_counterpart(&self) -> bool {
        matches!(
            self,
            Self::Conversations | Self::Comments | Self::Reactions | Self::Notifications
        )
    }
}

/// Downstream jobs the seeding pipelines can kick off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    FeedRebuild,
    EngagementSimulation,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FeedRebuild => "feed rebuild",
            Self::EngagementSimulation => "engagement simulation",
        }
    }
}
