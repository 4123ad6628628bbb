//! Demo environment seeding.
//!
//! Two native pipelines share one set of step types: full provisioning
//! creates both demo identities and everything around them, friend seeding
//! adds the second identity to an account that already exists. Both are
//! gated on the demo status so a repeated request is a no-op.

use std::sync::Arc;

use async_trait::async_trait;
use events::Level;
use phasestream_core::{
    ArtifactKind, DemoProfiles, DemoStatus, IdentityRole, JobKind, PhaseRegistry, PreconditionRef,
    Uid,
};
use tracing::info;

use crate::collaborators::DemoDirectory;
use crate::engine::{NativePhaseExecutor, OrderedEventEmitter, PhaseStep, StepContext, StepReport};
use crate::error::{OrchestratorError, Result};
use crate::gate::{GateDecision, PreconditionGate, StatusSnapshot};
use crate::state_machine::RunState;

use super::PipelineKind;

use ArtifactKind::{Comments, Conversations, Notifications, Photos, Posts, Profile, Reactions};
use IdentityRole::{Friend, Primary};

pub fn provision_registry() -> PhaseRegistry {
    PhaseRegistry::sequential(
        PipelineKind::Demo.name(),
        &[
            ("Account Status", Some(PreconditionRef::DemoAccountAbsent)),
            ("Demo Identity", None),
            ("Demo Profile", None),
            ("Demo Posts", None),
            ("Demo Photos", None),
            ("Friend Identity", Some(PreconditionRef::FriendAbsent)),
            ("Friendship", Some(PreconditionRef::AccountResolved)),
            ("Friend Profile", None),
            ("Friend Posts", None),
            ("Friend Photos", None),
            ("Conversations", None),
            ("Comments", None),
            ("Reactions", None),
            ("Notifications", None),
            ("Feed Rebuild", None),
            ("Social Engagement", None),
        ],
    )
}

fn provision_steps() -> Vec<Box<dyn PhaseStep<DemoRunContext>>> {
    vec![
        Box::new(AccountStatusStep),
        Box::new(CreateIdentityStep { role: Primary }),
        Box::new(SeedStep::owned(Profile, Primary)),
        Box::new(SeedStep::owned(Posts, Primary)),
        Box::new(SeedStep::owned(Photos, Primary)),
        Box::new(CreateIdentityStep { role: Friend }),
        Box::new(LinkStep),
        Box::new(SeedStep::owned(Profile, Friend)),
        Box::new(SeedStep::owned(Posts, Friend)),
        Box::new(SeedStep::owned(Photos, Friend)),
        Box::new(SeedStep::shared(Conversations)),
        Box::new(SeedStep::shared(Comments)),
        Box::new(SeedStep::shared(Reactions)),
        Box::new(SeedStep::shared(Notifications)),
        Box::new(TriggerStep::new(JobKind::FeedRebuild, &[Primary, Friend])),
        Box::new(TriggerStep::new(JobKind::EngagementSimulation, &[Primary])),
    ]
}

pub fn friend_registry() -> PhaseRegistry {
    PhaseRegistry::sequential(
        PipelineKind::DemoFriend.name(),
        &[
            ("Account Status", Some(PreconditionRef::FriendSeedable)),
            ("Friend Identity", Some(PreconditionRef::AccountResolved)),
            ("Friendship", None),
            ("Friend Profile", None),
            ("Friend Posts", None),
            ("Friend Photos", None),
            ("Conversations", None),
            ("Comments", None),
            ("Reactions", None),
            ("Notifications", None),
            ("Feed Rebuild", None),
        ],
    )
}

fn friend_steps() -> Vec<Box<dyn PhaseStep<DemoRunContext>>> {
    vec![
        Box::new(AccountStatusStep),
        Box::new(CreateIdentityStep { role: Friend }),
        Box::new(LinkStep),
        Box::new(SeedStep::owned(Profile, Friend)),
        Box::new(SeedStep::owned(Posts, Friend)),
        Box::new(SeedStep::owned(Photos, Friend)),
        Box::new(SeedStep::shared(Conversations)),
        Box::new(SeedStep::shared(Comments)),
        Box::new(SeedStep::shared(Reactions)),
        Box::new(SeedStep::shared(Notifications)),
        Box::new(TriggerStep::new(JobKind::FeedRebuild, &[Primary, Friend])),
    ]
}

/// Identifiers and counts accumulated while a demo pipeline runs
pub struct DemoRunContext {
    directory: Arc<dyn DemoDirectory>,
    profiles: DemoProfiles,
    status: DemoStatus,
    primary_uid: Option<Uid>,
    friend_uid: Option<Uid>,
    ledger: Vec<(u32, String)>,
}

impl DemoRunContext {
    pub fn new(
        directory: Arc<dyn DemoDirectory>,
        profiles: DemoProfiles,
        status: DemoStatus,
    ) -> Self {
        let primary_uid = status.uid.clone();
        Self {
            directory,
            profiles,
            status,
            primary_uid,
            friend_uid: None,
            ledger: Vec::new(),
        }
    }

    fn uid(&self, role: IdentityRole) -> Result<Uid> {
        let uid = match role {
            Primary => self.primary_uid.as_ref(),
            Friend => self.friend_uid.as_ref(),
        };
        uid.cloned().ok_or_else(|| {
            OrchestratorError::PreconditionFailed(format!(
                "{} account id has not been resolved",
                capitalize(role.as_str())
            ))
        })
    }

    fn display_name(&self, role: IdentityRole) -> &str {
        match role {
            Primary => &self.profiles.primary_display_name,
            Friend => &self.profiles.friend_display_name,
        }
    }

    fn record_identity(&mut self, role: IdentityRole, uid: Uid) {
        match role {
            Primary => {
                self.status.exists = true;
                self.status.uid = Some(uid.clone());
                self.primary_uid = Some(uid);
            }
            Friend => {
                self.status.friend_exists = true;
                self.status.friend_display_name = Some(self.profiles.friend_display_name.clone());
                self.friend_uid = Some(uid);
            }
        }
    }

    fn record(&mut self, count: u32, noun: impl Into<String>) {
        self.ledger.push((count, noun.into()));
    }
}

impl StepContext for DemoRunContext {
    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::demo(self.status.clone())
    }

    fn summary(&self) -> String {
        if self.ledger.is_empty() {
            return "Nothing was created".to_string();
        }
        let parts: Vec<String> = self
            .ledger
            .iter()
            .map(|(count, noun)| format!("{} {}", count, noun))
            .collect();
        format!("Created {}", parts.join(", "))
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn noun(count: u32, singular: &str, plural: &str) -> String {
    if count == 1 {
        singular.to_string()
    } else {
        plural.to_string()
    }
}

struct AccountStatusStep;

#[async_trait]
impl PhaseStep<DemoRunContext> for AccountStatusStep {
    async fn run(&self, ctx: &mut DemoRunContext) -> Result<StepReport> {
        let report = match &ctx.status.uid {
            Some(uid) if ctx.status.exists => {
                StepReport::success(format!("Found demo account ({})", uid))
            }
            _ => StepReport::info("No demo account found, provisioning a new one"),
        };
        Ok(report)
    }
}

struct CreateIdentityStep {
    role: IdentityRole,
}

#[async_trait]
impl PhaseStep<DemoRunContext> for CreateIdentityStep {
    async fn run(&self, ctx: &mut DemoRunContext) -> Result<StepReport> {
        let profile = ctx.profiles.profile(self.role);
        let uid = ctx.directory.create_identity(&profile).await?;

        ctx.record_identity(self.role, uid.clone());
        ctx.record(1, format!("{} account", self.role.as_str()));

        Ok(StepReport::info(format!("Creating {} <{}>", profile.display_name, profile.email))
            .with(
                Level::Success,
                format!("Created {} account {}", self.role.as_str(), uid),
            ))
    }
}

struct LinkStep;

#[async_trait]
impl PhaseStep<DemoRunContext> for LinkStep {
    async fn run(&self, ctx: &mut DemoRunContext) -> Result<StepReport> {
        let primary = ctx.uid(Primary)?;
        let friend = ctx.uid(Friend)?;
        ctx.directory.link_identities(&primary, &friend).await?;
        ctx.record(1, "friendship");

        Ok(StepReport::success(format!(
            "{} and {} are now friends",
            ctx.display_name(Primary),
            ctx.display_name(Friend)
        )))
    }
}

/// Writes one kind of content, either owned by a single identity or shared
/// between the two.
struct SeedStep {
    kind: ArtifactKind,
    owner: IdentityRole,
    counterpart: Option<IdentityRole>,
}

impl SeedStep {
    fn owned(kind: ArtifactKind, owner: IdentityRole) -> Self {
        Self {
            kind,
            owner,
            counterpart: None,
        }
    }

    fn shared(kind: ArtifactKind) -> Self {
        Self {
            kind,
            owner: Primary,
            counterpart: Some(Friend),
        }
    }

    fn noun(&self, count: u32) -> String {
        match (self.kind, self.counterpart) {
            (Profile, _) => format!(
                "{} {}",
                self.owner.as_str(),
                noun(count, "profile", "profiles")
            ),
            (_, Some(_)) => self.kind.as_str().to_string(),
            (_, None) => format!("{} {}", self.owner.as_str(), self.kind.as_str()),
        }
    }
}

#[async_trait]
impl PhaseStep<DemoRunContext> for SeedStep {
    async fn run(&self, ctx: &mut DemoRunContext) -> Result<StepReport> {
        let owner = ctx.uid(self.owner)?;
        let counterpart = match self.counterpart {
            Some(role) => Some(ctx.uid(role)?),
            None => None,
        };

        let count = ctx
            .directory
            .seed_artifacts(self.kind, &owner, counterpart.as_ref())
            .await?;
        ctx.record(count, self.noun(count));

        let message = match self.counterpart {
            Some(role) => format!(
                "Seeded {} {} between {} and {}",
                count,
                self.kind.as_str(),
                ctx.display_name(self.owner),
                ctx.display_name(role)
            ),
            None if self.kind == Profile => {
                format!("Created profile for {}", ctx.display_name(self.owner))
            }
            None => format!(
                "Seeded {} {} for {}",
                count,
                self.kind.as_str(),
                ctx.display_name(self.owner)
            ),
        };
        Ok(StepReport::success(message))
    }
}

/// Fires a downstream job for each target identity without awaiting its result
struct TriggerStep {
    job: JobKind,
    targets: Vec<IdentityRole>,
}

impl TriggerStep {
    fn new(job: JobKind, targets: &[IdentityRole]) -> Self {
        Self {
            job,
            targets: targets.to_vec(),
        }
    }
}

#[async_trait]
impl PhaseStep<DemoRunContext> for TriggerStep {
    async fn run(&self, ctx: &mut DemoRunContext) -> Result<StepReport> {
        let mut report = StepReport::new();
        for role in &self.targets {
            let uid = ctx.uid(*role)?;
            ctx.directory.trigger_downstream_job(self.job, &uid).await?;
            report = report.with(
                Level::Success,
                format!("Triggered {} for {}", self.job.as_str(), ctx.display_name(*role)),
            );
        }

        let count = self.targets.len() as u32;
        let job = self.job.as_str();
        ctx.record(
            count,
            noun(count, &format!("{} job", job), &format!("{} jobs", job)),
        );
        Ok(report)
    }
}

/// A demo seeding run bound to its directory and profiles
pub struct DemoPipeline {
    kind: PipelineKind,
    directory: Arc<dyn DemoDirectory>,
    profiles: DemoProfiles,
}

impl DemoPipeline {
    pub fn provision(directory: Arc<dyn DemoDirectory>, profiles: DemoProfiles) -> Self {
        Self {
            kind: PipelineKind::Demo,
            directory,
            profiles,
        }
    }

    pub fn friend(directory: Arc<dyn DemoDirectory>, profiles: DemoProfiles) -> Self {
        Self {
            kind: PipelineKind::DemoFriend,
            directory,
            profiles,
        }
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn registry(&self) -> PhaseRegistry {
        self.kind.registry()
    }

    fn steps(&self) -> Vec<Box<dyn PhaseStep<DemoRunContext>>> {
        match self.kind {
            PipelineKind::DemoFriend => friend_steps(),
            _ => provision_steps(),
        }
    }

    /// Resolve the demo status once, gate the run, then execute every phase.
    ///
    /// A rejected or skipped run produces exactly one terminal event and no
    /// collaborator writes.
    pub async fn run(self, emitter: &OrderedEventEmitter) -> Result<RunState> {
        let registry = Arc::new(self.registry());
        let executor = NativePhaseExecutor::new(Arc::clone(&registry), self.steps())?;

        let snapshot = match PreconditionGate::resolve(self.directory.as_ref()).await {
            Ok(snapshot) => snapshot,
            Err(decision) => return Ok(conclude(self.kind, decision, emitter)),
        };

        if let Some(precondition) = registry.first().and_then(|entry| entry.precondition) {
            let decision = PreconditionGate::evaluate(precondition, &snapshot);
            if !decision.is_proceed() {
                return Ok(conclude(self.kind, decision, emitter));
            }
        }

        let status = snapshot.demo.unwrap_or_default();
        let mut ctx = DemoRunContext::new(self.directory, self.profiles, status);
        executor.run(&mut ctx, emitter).await
    }
}

/// End a run that the entry gate stopped before any phase ran.
fn conclude(kind: PipelineKind, decision: GateDecision, emitter: &OrderedEventEmitter) -> RunState {
    match decision {
        GateDecision::Skip(reason) => {
            info!(pipeline = kind.name(), reason = %reason, "Run skipped, nothing to do");
            emitter.complete(Level::Warning, reason);
            RunState::Completed
        }
        GateDecision::Reject(reason) => {
            info!(pipeline = kind.name(), reason = %reason, "Run rejected");
            emitter.fail(reason);
            RunState::Failed
        }
        GateDecision::Proceed => RunState::NotStarted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CollaboratorError, MemoryDemoDirectory};
    use events::{progress_channel, ProgressEvent};
    use futures::StreamExt;
    use phasestream_core::IdentityProfile;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn run(pipeline: DemoPipeline) -> (RunState, Vec<ProgressEvent>) {
        let (tx, rx) = progress_channel();
        let emitter = OrderedEventEmitter::new(tx, pipeline.kind().name());
        let state = pipeline.run(&emitter).await.unwrap();
        (state, rx.collect().await)
    }

    fn memory() -> Arc<MemoryDemoDirectory> {
        Arc::new(MemoryDemoDirectory::default())
    }

    #[tokio::test]
    async fn test_full_provisioning() {
        let directory = memory();
        let (state, events) =
            run(DemoPipeline::provision(directory.clone(), DemoProfiles::default())).await;

        assert_eq!(state, RunState::Completed);
        assert_eq!(directory.identity_count().await, 2);
        assert_eq!(directory.link_count().await, 1);
        assert_eq!(directory.jobs().await.len(), 3);

        let mut last_phase = 0;
        for event in events.iter().filter(|e| !e.is_terminal()) {
            assert!(event.phase >= last_phase);
            last_phase = event.phase;
        }
        assert_eq!(last_phase, 16);

        let terminal = events.last().unwrap();
        assert_eq!(terminal.phase, 99);
        assert_eq!(terminal.level, Level::Success);
        assert!(terminal
            .message
            .starts_with("Created 1 demo account, 1 demo profile, 8 demo posts"));
        assert!(terminal.message.contains("1 friendship"));
        assert!(terminal.message.contains("3 conversations"));
        assert!(terminal.message.ends_with("2 feed rebuild jobs, 1 engagement simulation job"));
    }

    #[tokio::test]
    async fn test_second_provisioning_is_skipped() {
        let directory = memory();
        let (first, _) =
            run(DemoPipeline::provision(directory.clone(), DemoProfiles::default())).await;
        assert_eq!(first, RunState::Completed);
        let artifacts = directory.artifact_total().await;

        let (second, events) =
            run(DemoPipeline::provision(directory.clone(), DemoProfiles::default())).await;
        assert_eq!(second, RunState::Completed);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].phase, 99);
        assert_eq!(events[0].level, Level::Warning);
        assert!(events[0].message.starts_with("Demo account already exists"));

        assert_eq!(directory.artifact_total().await, artifacts);
        assert_eq!(directory.identity_count().await, 2);
    }

    #[tokio::test]
    async fn test_friend_seeding_after_primary_only() {
        let directory = memory();
        let profiles = DemoProfiles::default();
        directory.create_identity(&profiles.primary()).await.unwrap();

        let (state, events) = run(DemoPipeline::friend(directory.clone(), profiles)).await;
        assert_eq!(state, RunState::Completed);
        assert_eq!(directory.identity_count().await, 2);

        let phases: Vec<_> = events.iter().map(|e| e.phase).collect();
        assert_eq!(phases.first(), Some(&1));
        assert!(phases.contains(&11));
        assert_eq!(phases.last(), Some(&99));
        let terminal = events.last().unwrap();
        assert!(terminal.message.starts_with("Created 1 friend account, 1 friendship"));
    }

    #[tokio::test]
    async fn test_friend_seeding_without_account_rejects() {
        let (state, events) = run(DemoPipeline::friend(memory(), DemoProfiles::default())).await;
        assert_eq!(state, RunState::Failed);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].phase, -1);
        assert_eq!(events[0].level, Level::Error);
        assert_eq!(
            events[0].message,
            "No demo account found. Provision the demo account first."
        );
    }

    /// Reports a fixed status and counts every write attempt.
    struct StubDirectory {
        status: std::result::Result<DemoStatus, CollaboratorError>,
        writes: AtomicUsize,
        fail_seeding: Option<ArtifactKind>,
    }

    impl StubDirectory {
        fn new(status: std::result::Result<DemoStatus, CollaboratorError>) -> Self {
            Self {
                status,
                writes: AtomicUsize::new(0),
                fail_seeding: None,
            }
        }
    }

    #[async_trait]
    impl DemoDirectory for StubDirectory {
        async fn resolve_demo_status(&self) -> std::result::Result<DemoStatus, CollaboratorError> {
            self.status.clone()
        }
        async fn create_identity(
            &self,
            profile: &IdentityProfile,
        ) -> std::result::Result<Uid, CollaboratorError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(Uid::new(format!("{}-uid", profile.role.as_str())))
        }
        async fn link_identities(
            &self,
            _: &Uid,
            _: &Uid,
        ) -> std::result::Result<(), CollaboratorError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn seed_artifacts(
            &self,
            kind: ArtifactKind,
            _: &Uid,
            _: Option<&Uid>,
        ) -> std::result::Result<u32, CollaboratorError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_seeding == Some(kind) {
                return Err(CollaboratorError::new("permission denied"));
            }
            Ok(2)
        }
        async fn trigger_downstream_job(
            &self,
            _: JobKind,
            _: &Uid,
        ) -> std::result::Result<(), CollaboratorError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_existing_friend_skips_without_writes() {
        let directory = Arc::new(StubDirectory::new(Ok(
            DemoStatus::existing(Uid::new("demo-1")).with_friend("Sarah")
        )));
        let (state, events) =
            run(DemoPipeline::friend(directory.clone(), DemoProfiles::default())).await;

        assert_eq!(state, RunState::Completed);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].phase, 99);
        assert_eq!(events[0].level, Level::Warning);
        assert!(events[0].message.contains("Sarah"));
        assert_eq!(directory.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_status_failure_is_single_rejection() {
        let directory = Arc::new(StubDirectory::new(Err(CollaboratorError::new("unavailable"))));
        let (state, events) =
            run(DemoPipeline::provision(directory.clone(), DemoProfiles::default())).await;

        assert_eq!(state, RunState::Failed);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].phase, -1);
        assert_eq!(
            events[0].message,
            "Failed to check demo account status: unavailable"
        );
        assert_eq!(directory.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_seeding_failure_names_phase() {
        let mut stub = StubDirectory::new(Ok(DemoStatus::absent()));
        stub.fail_seeding = Some(Photos);
        let (state, events) =
            run(DemoPipeline::provision(Arc::new(stub), DemoProfiles::default())).await;

        assert_eq!(state, RunState::Failed);
        let error = events.iter().find(|e| e.level == Level::Error && e.phase == 5);
        assert_eq!(error.map(|e| e.message.as_str()), Some("permission denied"));
        let terminal = events.last().unwrap();
        assert_eq!(terminal.phase, -1);
        assert_eq!(terminal.message, "Demo Photos failed: permission denied");
        assert!(!events.iter().any(|e| e.phase == 6));
    }
}
