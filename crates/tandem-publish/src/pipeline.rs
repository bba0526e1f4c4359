//! The publish pipeline
//!
//! A run resolves the release set, asks for confirmation, then walks the
//! stage list from [`Stage::plan`]. Pack, publish and promotion are each a
//! full pass of the topological runner; a pass finishes before the next
//! stage starts.

use std::collections::HashMap;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use tandem_core::config::{NPM_REGISTRY, TEMP_DIST_TAG};
use tandem_core::error::{CycleError, PartialPublishError, RegistryError, Result, TandemError, ValidationError};
use tandem_core::hooks::{HookContext, HookRunner, HookStage};
use tandem_core::monorepo::graph::strongly_connected;
use tandem_core::monorepo::{DependencyGraph, LinkScope, LocalLinkResolver, PackageNode, PackedArtifact, ReleaseSet};
use tandem_core::traits::{Confirmer, GitClient, OtpPrompter, PackRequest, Packer, PublishRequest, RegistryClient};
use tandem_core::types::PublishedPackage;
use tandem_strategies::{ResolveContext, VersionResolver};
use tandem_tasks::{
    ConcurrencyLimit, CyclePolicy, RunError, RunnerOptions, TaskReporter, TopologicalRunner, TracingReporter,
};

use crate::context::PublishContext;
use crate::dist_tag::DistTagPlan;
use crate::license::StagedLicenses;
use crate::options::PublishOptions;
use crate::otp::{OtpCache, RegistryOp};
use crate::outcome::{AbortReason, PublishOutcome};
use crate::stages::Stage;

/// External systems a run talks to
#[derive(Clone)]
pub struct Collaborators {
    pub git: Arc<dyn GitClient>,
    pub registry: Arc<dyn RegistryClient>,
    pub packer: Arc<dyn Packer>,
    pub prompter: Arc<dyn OtpPrompter>,
    pub confirmer: Arc<dyn Confirmer>,
}

/// Publishes a release set in dependency order
pub struct PublishPipeline {
    root: PathBuf,
    options: PublishOptions,
    collaborators: Collaborators,
    hooks: HookRunner,
    reporter: Arc<dyn TaskReporter>,
}

impl PublishPipeline {
    pub fn new(root: impl Into<PathBuf>, options: PublishOptions, collaborators: Collaborators) -> Self {
        Self {
            root: root.into(),
            options,
            collaborators,
            hooks: HookRunner::new(),
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_hooks(mut self, hooks: HookRunner) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn TaskReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    /// Publish with the resolver the options select
    pub async fn run(&self, graph: DependencyGraph) -> Result<PublishOutcome> {
        self.options.validate()?;
        let resolver = self.options.resolver().ok_or_else(|| {
            ValidationError::Invalid(
                "nothing to publish from: pass \"from-git\", \"from-package\" or --canary".to_string(),
            )
        })?;
        self.run_with_resolver(graph, resolver.as_ref()).await
    }

    /// Publish with a caller supplied resolver
    #[instrument(skip_all, fields(strategy = resolver.name()))]
    pub async fn run_with_resolver(
        &self,
        graph: DependencyGraph,
        resolver: &dyn VersionResolver,
    ) -> Result<PublishOutcome> {
        self.options.validate()?;

        let outcome = {
            let ctx = ResolveContext {
                graph: &graph,
                git: self.collaborators.git.as_ref(),
                registry: self.collaborators.registry.as_ref(),
                yes: self.options.yes,
            };
            resolver.resolve(&ctx).await?
        };
        let release = outcome.release_set;
        if release.is_empty() {
            info!("No changed packages to publish");
            return Ok(PublishOutcome::Aborted(AbortReason::NoCandidates));
        }

        if self.options.reject_cycles {
            let cycles = release_cycles(&graph, &release);
            if let Some(members) = cycles.into_iter().next() {
                return Err(CycleError { members }.into());
            }
        }

        if outcome.needs_confirmation && !self.options.yes {
            let message = confirmation_message(&release);
            if !self.collaborators.confirmer.confirm(&message)? {
                info!("publish declined");
                return Ok(PublishOutcome::Aborted(AbortReason::Declined));
            }
        }

        let otp = Arc::new(OtpCache::new(
            self.collaborators.prompter.clone(),
            self.options.otp.clone(),
        ));
        let mut ctx = PublishContext::new(graph, release, otp);
        for stage in Stage::plan(&self.options) {
            debug!(stage = %stage, "entering stage");
            self.run_stage(stage, &mut ctx).await?;
        }

        let mut published = std::mem::take(&mut ctx.published);
        let position: HashMap<&str, usize> = ctx.order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
        published.sort_by_key(|p| position.get(p.name.as_str()).copied().unwrap_or(usize::MAX));
        Ok(PublishOutcome::Published(published))
    }

    async fn run_stage(&self, stage: Stage, ctx: &mut PublishContext) -> Result<()> {
        match stage {
            Stage::Preflight => self.preflight(ctx).await,
            Stage::StageLicenses => {
                self.stage_licenses(ctx);
                Ok(())
            }
            Stage::ApplyVersions => self.apply_versions(ctx),
            Stage::ResolveLocalLinks => self.resolve_local_links(ctx),
            Stage::AnnotateGitHead => {
                self.annotate_git_head(ctx);
                Ok(())
            }
            Stage::Serialize => self.serialize(ctx),
            Stage::Pack => self.pack(ctx).await,
            Stage::Publish => self.publish(ctx).await,
            Stage::ResetWorkingTree => {
                self.reset_working_tree(ctx);
                Ok(())
            }
            Stage::PromoteTempTag => self.promote(ctx).await,
        }
    }

    fn runner(&self) -> TopologicalRunner {
        let defaults = RunnerOptions::default();
        TopologicalRunner::new(RunnerOptions {
            concurrency: self.options.concurrency.unwrap_or(defaults.concurrency),
            cycle_policy: if self.options.reject_cycles {
                CyclePolicy::Reject
            } else {
                CyclePolicy::Warn
            },
        })
        .with_reporter(self.reporter.clone())
    }

    async fn preflight(&self, ctx: &mut PublishContext) -> Result<()> {
        let registry = self.collaborators.registry.as_ref();
        let url = registry.registry_url();
        if url.trim_end_matches('/') != NPM_REGISTRY.trim_end_matches('/') {
            info!(registry = %url, "Skipping all user and access validation due to third-party registry");
            info!("Make sure you're authenticated properly");
            return Ok(());
        }

        if self.options.verify_access {
            match registry.username().await {
                Ok(Some(username)) => {
                    debug!(username = %username, "verifying package access");
                    registry.package_access(&ctx.order, &username).await?;
                }
                Ok(None) => warn!("registry did not report a username, skipping access verification"),
                Err(RegistryError::AuthenticationFailed { .. }) => {
                    return Err(ValidationError::NotAuthenticated(url.to_string()).into())
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            info!("Skipping package access verification");
        }

        ctx.two_factor_required = registry.two_factor_required().await?;
        debug!(required = ctx.two_factor_required, "two-factor authentication");
        Ok(())
    }

    fn stage_licenses(&self, ctx: &mut PublishContext) {
        let targets: Vec<(String, PathBuf)> = ctx
            .order
            .iter()
            .filter_map(|name| ctx.graph.get(name))
            .map(|node| (node.name().to_string(), contents_dir(node, self.options.contents.as_deref())))
            .collect();
        ctx.licenses = StagedLicenses::stage(&self.root, &targets);
    }

    fn apply_versions(&self, ctx: &mut PublishContext) -> Result<()> {
        for entry in ctx.release.iter() {
            if let Some(node) = ctx.graph.get_mut(&entry.name) {
                if node.version() != Some(&entry.version) {
                    debug!(package = %entry.name, version = %entry.version, "applying release version");
                    node.set_version(entry.version.clone());
                }
            }
        }

        if self.options.canary {
            let resolver = LocalLinkResolver::new(self.options.exact, &self.options.preserve_links)?;
            let rewrites = resolver.plan(&ctx.graph, &ctx.order, &ctx.release, LinkScope::All);
            LocalLinkResolver::apply(&mut ctx.graph, &rewrites);
        }
        Ok(())
    }

    fn resolve_local_links(&self, ctx: &mut PublishContext) -> Result<()> {
        let resolver = LocalLinkResolver::new(self.options.exact, &self.options.preserve_links)?;
        let rewrites = resolver.plan(&ctx.graph, &ctx.order, &ctx.release, LinkScope::Links);
        LocalLinkResolver::apply(&mut ctx.graph, &rewrites);
        Ok(())
    }

    fn annotate_git_head(&self, ctx: &mut PublishContext) {
        let sha = match &self.options.git_head {
            Some(sha) => sha.clone(),
            None => match self.collaborators.git.current_sha() {
                Ok(sha) => sha,
                Err(e) => {
                    warn!(error = %e, "Unable to determine git HEAD, publishing without gitHead");
                    return;
                }
            },
        };
        for name in &ctx.order {
            if let Some(node) = ctx.graph.get_mut(name) {
                node.set_git_head(&sha);
            }
        }
    }

    fn serialize(&self, ctx: &mut PublishContext) -> Result<()> {
        for name in &ctx.order {
            if let Some(node) = ctx.graph.get(name) {
                node.serialize()?;
                ctx.written.push(node.manifest_path().to_path_buf());
            }
        }
        Ok(())
    }

    async fn pack(&self, ctx: &mut PublishContext) -> Result<()> {
        let tarballs = tempfile::Builder::new().prefix("tandem-pack-").tempdir()?;
        let task = Arc::new(PackTask {
            packer: self.collaborators.packer.clone(),
            graph: ctx.snapshot(),
            hooks: self.hooks.clone(),
            contents: self.options.contents.clone(),
            destination: tarballs.path().to_path_buf(),
            ignore_scripts: self.options.ignore_scripts,
        });
        ctx.tarballs = Some(tarballs);

        let result = self
            .runner()
            .run(Stage::Pack.as_str(), ctx.edges(), move |name, _limit| {
                let task = task.clone();
                async move { task.pack(&name).await }
            })
            .await;
        ctx.licenses.cleanup();

        for (name, artifact) in result.map_err(|e| partial_failure(Stage::Pack, e))? {
            if let Some(node) = ctx.graph.get_mut(&name) {
                node.set_packed(artifact);
                node.refresh()?;
            }
        }
        Ok(())
    }

    async fn publish(&self, ctx: &mut PublishContext) -> Result<()> {
        let root_hooks = HookContext::new().with_cwd(&self.root);
        run_hooks(&self.hooks, HookStage::PrePublish, root_hooks.clone()).await?;

        if ctx.two_factor_required {
            ctx.otp.prime().await?;
        }

        let task = Arc::new(PublishTask {
            registry: self.collaborators.registry.clone(),
            otp: ctx.otp.clone(),
            graph: ctx.snapshot(),
            tags: DistTagPlan::from_options(&self.options),
            hooks: self.hooks.clone(),
        });
        let published = self
            .runner()
            .run(Stage::Publish.as_str(), ctx.edges(), move |name, limit| {
                let task = task.clone();
                async move { task.publish(&name, &limit).await }
            })
            .await
            .map_err(|e| partial_failure(Stage::Publish, e))?;
        ctx.published = published.into_iter().map(|(_, pkg)| pkg).collect();

        run_hooks(&self.hooks, HookStage::PostPublish, root_hooks).await
    }

    fn reset_working_tree(&self, ctx: &mut PublishContext) {
        if ctx.written.is_empty() {
            return;
        }
        match self.collaborators.git.checkout(&ctx.written) {
            Ok(()) => debug!(files = ctx.written.len(), "reset manifests"),
            Err(e) => warn!(error = %e, "Unable to reset working tree changes, this probably isn't a git repo"),
        }
    }

    async fn promote(&self, ctx: &mut PublishContext) -> Result<()> {
        let task = Arc::new(PromoteTask {
            registry: self.collaborators.registry.clone(),
            otp: ctx.otp.clone(),
            graph: ctx.snapshot(),
            tags: DistTagPlan::from_options(&self.options),
        });
        self.runner()
            .run(Stage::PromoteTempTag.as_str(), ctx.edges(), move |name, limit| {
                let task = task.clone();
                async move { task.promote(&name, &limit).await }
            })
            .await
            .map_err(|e| partial_failure(Stage::PromoteTempTag, e))?;
        Ok(())
    }
}

struct PackTask {
    packer: Arc<dyn Packer>,
    graph: Arc<DependencyGraph>,
    hooks: HookRunner,
    contents: Option<String>,
    destination: PathBuf,
    ignore_scripts: bool,
}

impl PackTask {
    async fn pack(&self, name: &str) -> Result<PackedArtifact> {
        let node = lookup(&self.graph, name)?;
        let hooks = package_hook_context(node);
        run_hooks(&self.hooks, HookStage::PrePack, hooks.clone()).await?;

        let request = PackRequest {
            name: name.to_string(),
            location: node.location().to_path_buf(),
            contents: contents_dir(node, self.contents.as_deref()),
            destination: self.destination.clone(),
            ignore_scripts: self.ignore_scripts,
        };
        let artifact = self.packer.pack(&request).await?;
        debug!(package = %name, tarball = %artifact.tarball_path.display(), "packed");

        run_hooks(&self.hooks, HookStage::PostPack, hooks).await?;
        Ok(artifact)
    }
}

struct PublishTask {
    registry: Arc<dyn RegistryClient>,
    otp: Arc<OtpCache>,
    graph: Arc<DependencyGraph>,
    tags: DistTagPlan,
    hooks: HookRunner,
}

impl PublishTask {
    async fn publish(&self, name: &str, limit: &ConcurrencyLimit) -> Result<PublishedPackage> {
        let node = lookup(&self.graph, name)?;
        let version = node
            .version()
            .cloned()
            .ok_or_else(|| ValidationError::MissingVersion(name.to_string()))?;
        let artifact = node
            .packed()
            .ok_or_else(|| TandemError::other(format!("{} has no packed tarball", name)))?;
        let config = node.manifest().publish_config();
        let tag = self.tags.publish_tag(&version, config.tag.as_deref());

        let request = PublishRequest {
            name: name.to_string(),
            version: version.clone(),
            tarball: artifact.tarball_path.clone(),
            tag: tag.clone(),
            access: config.access,
            location: node.location().to_path_buf(),
        };
        let hooks = package_hook_context(node).with_dist_tag(&tag);
        run_hooks(&self.hooks, HookStage::PrePublish, hooks.clone()).await?;

        self.otp
            .run(self.registry.as_ref(), &RegistryOp::Publish(&request), limit)
            .await?;
        info!(package = %name, version = %version, tag = %tag, "published");

        run_hooks(&self.hooks, HookStage::PostPublish, hooks).await?;
        Ok(PublishedPackage::new(name, version.to_string()))
    }
}

struct PromoteTask {
    registry: Arc<dyn RegistryClient>,
    otp: Arc<OtpCache>,
    graph: Arc<DependencyGraph>,
    tags: DistTagPlan,
}

impl PromoteTask {
    async fn promote(&self, name: &str, limit: &ConcurrencyLimit) -> Result<()> {
        let node = lookup(&self.graph, name)?;
        let version = node
            .version()
            .ok_or_else(|| ValidationError::MissingVersion(name.to_string()))?;
        let tag = self
            .tags
            .promotion_tag(version, node.manifest().publish_config().tag.as_deref());
        let spec = format!("{}@{}", name, version);

        let registry = self.registry.as_ref();
        self.otp
            .run(registry, &RegistryOp::RemoveDistTag { spec: &spec, tag: TEMP_DIST_TAG }, limit)
            .await?;
        self.otp
            .run(registry, &RegistryOp::AddDistTag { spec: &spec, tag: &tag }, limit)
            .await?;
        info!(package = %name, tag = %tag, "promoted");
        Ok(())
    }
}

fn lookup<'a>(graph: &'a DependencyGraph, name: &str) -> Result<&'a PackageNode> {
    graph
        .get(name)
        .ok_or_else(|| ValidationError::UnknownPackage(name.to_string()).into())
}

fn contents_dir(node: &PackageNode, contents: Option<&str>) -> PathBuf {
    match contents {
        Some(dir) => node.location().join(dir),
        None => node.location().to_path_buf(),
    }
}

fn package_hook_context(node: &PackageNode) -> HookContext {
    let mut context = HookContext::new()
        .with_package_name(node.name())
        .with_cwd(node.location());
    if let Some(version) = node.version() {
        context = context.with_version(version.to_string());
    }
    context
}

async fn run_hooks(hooks: &HookRunner, stage: HookStage, context: HookContext) -> Result<()> {
    if !hooks.has_hooks(stage) {
        return Ok(());
    }
    let hooks = hooks.clone();
    tokio::task::spawn_blocking(move || hooks.run(stage, &context))
        .await
        .map_err(|e| TandemError::other(format!("{} hooks did not finish: {}", stage.as_str(), e)))??;
    Ok(())
}

fn partial_failure(stage: Stage, err: RunError) -> TandemError {
    match err {
        RunError::Cycle(e) => e.into(),
        RunError::Failed(failure) => PartialPublishError {
            stage: stage.as_str().to_string(),
            succeeded: failure.completed.clone(),
            failed: failure.failures.iter().map(|f| f.to_package_failure()).collect(),
            skipped: failure.skipped.clone(),
        }
        .into(),
    }
}

/// Prompt listing every package with its target version
pub fn confirmation_message(release: &ReleaseSet) -> String {
    let count = release.len();
    let mut message = format!(
        "Found {} package{} to publish:",
        count,
        if count == 1 { "" } else { "s" }
    );
    for entry in release.iter() {
        let _ = write!(message, "\n - {} => {}", entry.name, entry.version);
    }
    message.push_str("\nAre you sure you want to publish these packages?");
    message
}

/// Cycles among the released packages, members in declaration order
fn release_cycles(graph: &DependencyGraph, release: &ReleaseSet) -> Vec<Vec<String>> {
    let names: Vec<String> = graph
        .packages()
        .map(|p| p.name().to_string())
        .filter(|n| release.contains(n))
        .collect();
    let edges = graph.induced_edges(&names);
    let index: HashMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
    let adjacency: Vec<Vec<usize>> = edges
        .iter()
        .map(|(_, deps)| deps.iter().filter_map(|d| index.get(d.as_str()).copied()).collect())
        .collect();

    strongly_connected(&adjacency)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| component.into_iter().map(|i| names[i].clone()).collect())
        .collect()
}
