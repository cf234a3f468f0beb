//! Bot deployment pipeline.
//!
//! A run goes through these stages, in order, and stops at the first failure:
//!
//! | Stage | Module | Effect |
//! |-------|--------|--------|
//! | validate | [`crate::registry`] | bot names are token-safe and unique |
//! | build | [`bundle`] | artifacts become one transaction bundle with placeholders |
//! | reconcile | [`reconcile`] | each bot exists remotely, membership admin flag aligned |
//! | resolve | [`resolve`] | placeholders replaced with reconciled identities |
//! | submit | [`transaction`] | bundle applied atomically, every entry must succeed |
//! | deploy code | [`code`] | compiled code pushed to each bot's runtime |
//!
//! Nothing remote is touched until the bundle has been built, so a missing
//! artifact fails the run before any network call.

pub mod bundle;
pub mod code;
pub mod context;
pub mod reconcile;
pub mod report;
pub mod resolve;
pub mod transaction;

use std::fmt;

use tracing::{error, info};

use crate::errors::DeployError;
use crate::platform::FhirPlatform;
use crate::registry::{self, BotDescriptor};

pub use bundle::{ArtifactStore, FsArtifactStore, build_bundle};
pub use code::DeployedCode;
pub use context::{DeployContext, RemoteBotIdentity};
pub use report::{DeployReport, ReportWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    Validate,
    Build,
    Reconcile,
    Resolve,
    Submit,
    DeployCode,
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeployStage::Validate => "Validating registry",
            DeployStage::Build => "Building bundle",
            DeployStage::Reconcile => "Reconciling bot identities",
            DeployStage::Resolve => "Resolving placeholders",
            DeployStage::Submit => "Submitting transaction",
            DeployStage::DeployCode => "Deploying bot code",
        };
        f.write_str(label)
    }
}

/// Observer for pipeline progress. All methods default to no-ops.
pub trait DeployProgress: Send + Sync {
    fn stage_started(&self, _stage: DeployStage) {}
    fn stage_finished(&self, _stage: DeployStage) {}
    fn stage_failed(&self, _stage: DeployStage, _error: &DeployError) {}
}

pub struct NoProgress;

impl DeployProgress for NoProgress {}

/// Everything a run produced, including partial progress on failure.
pub struct DeployRun {
    pub ctx: DeployContext,
    pub deployed: Vec<DeployedCode>,
    pub result: Result<(), DeployError>,
}

impl DeployRun {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Collaborators for a deploy run.
pub struct Deployer<'a> {
    platform: &'a dyn FhirPlatform,
    store: &'a dyn ArtifactStore,
    progress: &'a dyn DeployProgress,
}

impl<'a> Deployer<'a> {
    pub fn new(platform: &'a dyn FhirPlatform, store: &'a dyn ArtifactStore) -> Self {
        Self {
            platform,
            store,
            progress: &NoProgress,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn DeployProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Deploy `descriptors` into `project_id`.
    pub async fn run(&self, project_id: &str, descriptors: &[BotDescriptor]) -> DeployRun {
        let mut run = DeployRun {
            ctx: DeployContext::new(project_id),
            deployed: Vec::new(),
            result: Ok(()),
        };
        run.result = self
            .run_stages(descriptors, &mut run.ctx, &mut run.deployed)
            .await;
        match &run.result {
            Ok(()) => info!(bots = run.deployed.len(), "deploy completed"),
            Err(e) => error!(error = %e, "deploy failed"),
        }
        run
    }

    async fn run_stages(
        &self,
        descriptors: &[BotDescriptor],
        ctx: &mut DeployContext,
        deployed: &mut Vec<DeployedCode>,
    ) -> Result<(), DeployError> {
        self.stage(DeployStage::Validate, async { registry::validate(descriptors) })
            .await?;
        let bundle = self
            .stage(DeployStage::Build, async {
                build_bundle(descriptors, self.store)
            })
            .await?;
        self.stage(
            DeployStage::Reconcile,
            reconcile::reconcile_all(self.platform, ctx, descriptors),
        )
        .await?;
        let resolved = self
            .stage(DeployStage::Resolve, async {
                resolve::resolve_bundle(&bundle, ctx)
            })
            .await?;
        self.stage(
            DeployStage::Submit,
            transaction::execute_transaction(self.platform, &resolved),
        )
        .await?;
        // Compiled code is looked up by synthetic id, so use the unresolved bundle.
        self.stage(
            DeployStage::DeployCode,
            code::deploy_code(self.platform, ctx, &bundle, deployed),
        )
        .await
    }

    async fn stage<T>(
        &self,
        stage: DeployStage,
        work: impl Future<Output = Result<T, DeployError>>,
    ) -> Result<T, DeployError> {
        self.progress.stage_started(stage);
        match work.await {
            Ok(value) => {
                self.progress.stage_finished(stage);
                Ok(value)
            }
            Err(e) => {
                self.progress.stage_failed(stage, &e);
                Err(e)
            }
        }
    }
}
