//! Release whatever the tags at HEAD say was just versioned

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semver::Version;
use tracing::{debug, info, instrument, warn};

use tandem_core::error::{Result, ValidationError};
use tandem_core::monorepo::{DependencyGraph, ReleaseSet};
use tandem_core::traits::GitClient;

use crate::traits::{ResolveContext, ResolveOutcome, VersionResolver};
use crate::working_tree::require_clean;

/// Glob matching `name@version` tags
pub const INDEPENDENT_TAG_PATTERN: &str = "*@*";

/// Resolver for `from-git`: packages tagged on the HEAD commit
#[derive(Debug, Clone)]
pub struct FromGit {
    independent: bool,
    tag_prefix: String,
}

impl FromGit {
    pub fn new(independent: bool, tag_prefix: impl Into<String>) -> Self {
        Self {
            independent,
            tag_prefix: tag_prefix.into(),
        }
    }

    /// Tag glob for the current versioning mode
    pub fn tag_pattern(&self) -> String {
        if self.independent {
            INDEPENDENT_TAG_PATTERN.to_string()
        } else {
            format!("{}*.*.*", self.tag_prefix)
        }
    }

    fn resolve_independent(&self, graph: &DependencyGraph, tags: &[String]) -> Result<ReleaseSet> {
        let mut set = ReleaseSet::new();
        for tag in tags {
            let Some((name, _)) = tag.rsplit_once('@') else {
                continue;
            };
            let Some(node) = graph.get(name) else {
                debug!(tag = %tag, "tag does not name a package in this repository");
                continue;
            };
            let Some(version) = node.version() else {
                continue;
            };
            set.insert(node, version.clone());
        }
        Ok(set)
    }

    fn resolve_fixed(&self, graph: &DependencyGraph, git: &dyn GitClient, tags: &[String]) -> Result<ReleaseSet> {
        let version_text = tags
            .last()
            .map(|t| t.strip_prefix(self.tag_prefix.as_str()).unwrap_or(t))
            .unwrap_or_default();
        let tagged = Version::parse(version_text).map_err(|e| ValidationError::InvalidVersion {
            package: "<fixed>".to_string(),
            version: version_text.to_string(),
            reason: e.to_string(),
        })?;

        let changed = git.files_changed_in_head()?;
        let root = git.root();
        let mut set = ReleaseSet::new();
        for node in graph.packages() {
            if !manifest_changed(root, node.manifest_path(), &changed) {
                continue;
            }
            if node.version() != Some(&tagged) {
                warn!(
                    package = node.name(),
                    tag = %tagged,
                    "manifest version differs from the release tag"
                );
            }
            if let Some(version) = node.version() {
                set.insert(node, version.clone());
            }
        }
        Ok(set)
    }
}

fn manifest_changed(root: &Path, manifest_path: &Path, changed: &[PathBuf]) -> bool {
    let Ok(relative) = manifest_path.strip_prefix(root) else {
        return false;
    };
    changed.iter().any(|file| file.as_path() == relative)
}

#[async_trait]
impl VersionResolver for FromGit {
    fn name(&self) -> &'static str {
        "from-git"
    }

    #[instrument(skip(self, ctx), fields(independent = self.independent))]
    async fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<ResolveOutcome> {
        require_clean(ctx.git)?;

        let tags = ctx.git.current_tags(&self.tag_pattern())?;
        if tags.is_empty() {
            info!("no tags found on HEAD");
            return Ok(ResolveOutcome::default());
        }

        let set = if self.independent {
            self.resolve_independent(ctx.graph, &tags)?
        } else {
            self.resolve_fixed(ctx.graph, ctx.git, &tags)?
        };
        Ok(ResolveOutcome::automatic(set, ctx.yes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{graph, CleanState, FakeGit, FakeRegistry};

    fn rows() -> DependencyGraph {
        graph(&[
            ("core", "1.1.0", false, &[]),
            ("app", "1.1.0", false, &["core"]),
            ("site", "1.1.0", true, &["app"]),
        ])
    }

    async fn resolve(resolver: &FromGit, git: &FakeGit, graph: &DependencyGraph) -> Result<ResolveOutcome> {
        let registry = FakeRegistry::default();
        let ctx = ResolveContext {
            graph,
            git,
            registry: &registry,
            yes: false,
        };
        resolver.resolve(&ctx).await
    }

    #[test]
    fn test_tag_patterns() {
        assert_eq!(FromGit::new(true, "v").tag_pattern(), "*@*");
        assert_eq!(FromGit::new(false, "v").tag_pattern(), "v*.*.*");
    }

    #[tokio::test]
    async fn test_independent_tags_select_packages() {
        let graph = rows();
        let mut git = FakeGit::new();
        git.tags_at_head = vec!["core@1.1.0".to_string(), "site@1.1.0".to_string(), "gone@2.0.0".to_string()];

        let outcome = resolve(&FromGit::new(true, "v"), &git, &graph).await.unwrap();
        assert_eq!(outcome.release_set.names(), vec!["core"]);
        assert!(outcome.needs_confirmation);
    }

    #[tokio::test]
    async fn test_fixed_mode_uses_manifests_changed_in_head() {
        let graph = rows();
        let mut git = FakeGit::new();
        git.tags_at_head = vec!["v1.1.0".to_string()];
        git.head_files = vec![
            PathBuf::from("packages/app/package.json"),
            PathBuf::from("packages/site/package.json"),
            PathBuf::from("packages/core/index.js"),
        ];

        let outcome = resolve(&FromGit::new(false, "v"), &git, &graph).await.unwrap();
        assert_eq!(outcome.release_set.names(), vec!["app"]);
        assert_eq!(outcome.release_set.version_of("app"), Some(&Version::new(1, 1, 0)));
    }

    #[tokio::test]
    async fn test_no_tags_is_empty() {
        let graph = rows();
        let git = FakeGit::new();
        let outcome = resolve(&FromGit::new(false, "v"), &git, &graph).await.unwrap();
        assert!(outcome.release_set.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_resolution_is_stable() {
        let graph = rows();
        let mut git = FakeGit::new();
        git.tags_at_head = vec!["core@1.1.0".to_string(), "app@1.1.0".to_string()];
        let resolver = FromGit::new(true, "v");

        let first = resolve(&resolver, &git, &graph).await.unwrap();
        let second = resolve(&resolver, &git, &graph).await.unwrap();
        assert_eq!(first.release_set, second.release_set);
    }

    #[tokio::test]
    async fn test_dirty_tree_is_rejected() {
        let graph = rows();
        let mut git = FakeGit::new();
        git.clean = CleanState::Dirty;
        let err = resolve(&FromGit::new(true, "v"), &git, &graph).await.unwrap_err();
        assert!(matches!(err, tandem_core::TandemError::WorkingTree(_)));
    }

    #[tokio::test]
    async fn test_missing_repository_is_fatal() {
        let graph = rows();
        let mut git = FakeGit::new();
        git.clean = CleanState::NoRepository;
        assert!(resolve(&FromGit::new(true, "v"), &git, &graph).await.is_err());
    }
}
