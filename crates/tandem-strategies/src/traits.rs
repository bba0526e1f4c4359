//! Version resolver traits

use async_trait::async_trait;

use tandem_core::error::Result;
use tandem_core::monorepo::{DependencyGraph, ReleaseSet};
use tandem_core::traits::{GitClient, RegistryClient};

/// Collaborators and inputs shared by every resolver
pub struct ResolveContext<'a> {
    /// Package graph of the monorepo
    pub graph: &'a DependencyGraph,
    /// Git collaborator
    pub git: &'a dyn GitClient,
    /// Registry collaborator
    pub registry: &'a dyn RegistryClient,
    /// The operator already agreed to proceed (`--yes`)
    pub yes: bool,
}

/// What a resolver decided
#[derive(Debug, Clone, Default)]
pub struct ResolveOutcome {
    /// Packages to release with their target versions
    pub release_set: ReleaseSet,
    /// Whether the pipeline must ask before doing anything destructive
    pub needs_confirmation: bool,
}

impl ResolveOutcome {
    /// Outcome for an automatic strategy
    pub fn automatic(release_set: ReleaseSet, yes: bool) -> Self {
        Self {
            release_set,
            needs_confirmation: !yes,
        }
    }
}

/// A strategy that decides which packages to release and at what version
#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// Get the name of this strategy
    fn name(&self) -> &'static str;

    /// Compute the release set
    async fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<ResolveOutcome>;
}
