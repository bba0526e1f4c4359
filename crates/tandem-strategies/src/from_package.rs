//! Release manifest versions the registry does not have yet

use async_trait::async_trait;
use tracing::{debug, instrument};

use tandem_core::error::Result;
use tandem_core::monorepo::ReleaseSet;

use crate::traits::{ResolveContext, ResolveOutcome, VersionResolver};
use crate::working_tree::require_clean_if_repository;

/// Resolver for `from-package`
#[derive(Debug, Clone, Copy, Default)]
pub struct FromPackage;

#[async_trait]
impl VersionResolver for FromPackage {
    fn name(&self) -> &'static str {
        "from-package"
    }

    #[instrument(skip_all)]
    async fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<ResolveOutcome> {
        require_clean_if_repository(ctx.git)?;

        let mut set = ReleaseSet::new();
        for node in ctx.graph.packages() {
            if node.is_private() {
                continue;
            }
            let Some(version) = node.version() else {
                continue;
            };
            if ctx.registry.is_published(node.name(), version).await? {
                debug!(package = node.name(), version = %version, "already published");
                continue;
            }
            set.insert(node, version.clone());
        }

        Ok(ResolveOutcome::automatic(set, ctx.yes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{graph, CleanState, FakeGit, FakeRegistry};
    use tandem_core::monorepo::DependencyGraph;

    fn rows() -> DependencyGraph {
        graph(&[
            ("core", "1.0.0", false, &[]),
            ("app", "2.0.0", false, &["core"]),
            ("site", "0.1.0", true, &[]),
        ])
    }

    async fn resolve(git: &FakeGit, registry: &FakeRegistry, yes: bool) -> Result<ResolveOutcome> {
        let graph = rows();
        let ctx = ResolveContext {
            graph: &graph,
            git,
            registry,
            yes,
        };
        FromPackage.resolve(&ctx).await
    }

    #[tokio::test]
    async fn test_only_unpublished_versions_are_selected() {
        let mut registry = FakeRegistry::default();
        registry.published.insert("core@1.0.0".to_string());

        let outcome = resolve(&FakeGit::new(), &registry, true).await.unwrap();
        assert_eq!(outcome.release_set.names(), vec!["app"]);
        assert!(!outcome.needs_confirmation);
    }

    #[tokio::test]
    async fn test_proceeds_without_repository() {
        let mut git = FakeGit::new();
        git.clean = CleanState::NoRepository;
        let outcome = resolve(&git, &FakeRegistry::default(), false).await.unwrap();
        assert_eq!(outcome.release_set.names(), vec!["core", "app"]);
    }

    #[tokio::test]
    async fn test_dirty_tree_still_fails() {
        let mut git = FakeGit::new();
        git.clean = CleanState::Dirty;
        assert!(resolve(&git, &FakeRegistry::default(), false).await.is_err());
    }
}
