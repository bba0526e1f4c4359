//! Synthetic prerelease versions for testing builds
//!
//! A canary version never touches version history: it is derived from the
//! last release tag, the number of commits since that tag and the HEAD sha.

use async_trait::async_trait;
use semver::Version;
use tracing::{debug, info, instrument};

use tandem_core::error::{Result, ValidationError};
use tandem_core::monorepo::{changed_packages, DependencyGraph, ReleaseSet};
use tandem_core::traits::{DescribeResult, GitClient};
use tandem_core::types::ReleaseType;

use crate::from_git::INDEPENDENT_TAG_PATTERN;
use crate::increment::increment;
use crate::traits::{ResolveContext, ResolveOutcome, VersionResolver};
use crate::working_tree::require_clean_if_repository;

/// Compute `inc(last, bump)-preid.(refCount - 1)+sha`.
///
/// `bump` is reduced to its base kind (`preminor` and `minor` both bump the
/// minor component, `prerelease` bumps the patch). `tag_prefix` is stripped
/// from `last` when present.
pub fn canary_version(
    last: &str,
    tag_prefix: &str,
    bump: ReleaseType,
    preid: &str,
    ref_count: u64,
    sha: &str,
) -> Result<Version> {
    let base_text = last.strip_prefix(tag_prefix).unwrap_or(last);
    let base = Version::parse(base_text).map_err(|e| ValidationError::InvalidVersion {
        package: "<canary>".to_string(),
        version: last.to_string(),
        reason: e.to_string(),
    })?;

    let next = increment(&base, base_release(bump), None)?;
    let text = format!("{}-{}.{}+{}", next, preid, ref_count.saturating_sub(1), sha);
    Version::parse(&text).map_err(|e| {
        ValidationError::InvalidVersion {
            package: "<canary>".to_string(),
            version: text.clone(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn base_release(bump: ReleaseType) -> ReleaseType {
    match bump {
        ReleaseType::Major | ReleaseType::Premajor => ReleaseType::Major,
        ReleaseType::Minor | ReleaseType::Preminor => ReleaseType::Minor,
        ReleaseType::Patch | ReleaseType::Prepatch | ReleaseType::Prerelease => ReleaseType::Patch,
    }
}

/// Resolver for `--canary`
#[derive(Debug, Clone)]
pub struct Canary {
    independent: bool,
    tag_prefix: String,
    preid: String,
    bump: ReleaseType,
    include_merged_tags: bool,
    force_publish: bool,
    fixed_version: Option<Version>,
}

impl Canary {
    pub fn new(independent: bool, tag_prefix: impl Into<String>) -> Self {
        Self {
            independent,
            tag_prefix: tag_prefix.into(),
            preid: "alpha".to_string(),
            bump: ReleaseType::Patch,
            include_merged_tags: false,
            force_publish: false,
            fixed_version: None,
        }
    }

    pub fn with_preid(mut self, preid: impl Into<String>) -> Self {
        self.preid = preid.into();
        self
    }

    pub fn with_bump(mut self, bump: ReleaseType) -> Self {
        self.bump = bump;
        self
    }

    pub fn with_include_merged_tags(mut self, include: bool) -> Self {
        self.include_merged_tags = include;
        self
    }

    /// Treat every package as changed
    pub fn with_force_publish(mut self, force: bool) -> Self {
        self.force_publish = force;
        self
    }

    /// Project-wide version used in fixed mode when no tag is reachable
    pub fn with_fixed_version(mut self, version: Option<Version>) -> Self {
        self.fixed_version = version;
        self
    }

    fn repo_pattern(&self) -> String {
        if self.independent {
            INDEPENDENT_TAG_PATTERN.to_string()
        } else {
            format!("{}*.*.*", self.tag_prefix)
        }
    }

    /// Public packages changed since the last release, plus dependents
    fn candidates(&self, graph: &DependencyGraph, git: &dyn GitClient) -> Result<Vec<String>> {
        let all = || -> Vec<String> { graph.packages().map(|p| p.name().to_string()).collect() };

        let names = if self.force_publish {
            all()
        } else {
            let described = git.describe_ref(&self.repo_pattern(), self.include_merged_tags)?;
            match described.last_tag_name {
                None => {
                    debug!("no release tag reachable, every package is a candidate");
                    all()
                }
                Some(_) if described.ref_count == 0 => {
                    info!("current HEAD is already released, skipping change detection");
                    Vec::new()
                }
                Some(tag) => {
                    let files = git.files_changed_since(&tag)?;
                    changed_packages(graph, git.root(), &files)
                }
            }
        };

        Ok(names
            .into_iter()
            .filter(|n| graph.get(n).map_or(false, |p| !p.is_private()))
            .collect())
    }

    fn version_from(&self, described: &DescribeResult, fallback: Option<&Version>) -> Result<Option<Version>> {
        let last = match (&described.last_version, fallback) {
            (Some(last), _) => last.clone(),
            (None, Some(fallback)) => fallback.to_string(),
            (None, None) => return Ok(None),
        };
        canary_version(
            &last,
            &self.tag_prefix,
            self.bump,
            &self.preid,
            described.ref_count,
            &described.sha,
        )
        .map(Some)
    }
}

#[async_trait]
impl VersionResolver for Canary {
    fn name(&self) -> &'static str {
        "canary"
    }

    #[instrument(skip(self, ctx), fields(independent = self.independent, preid = %self.preid))]
    async fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<ResolveOutcome> {
        require_clean_if_repository(ctx.git)?;

        let candidates = self.candidates(ctx.graph, ctx.git)?;
        let mut set = ReleaseSet::new();

        if self.independent {
            for name in &candidates {
                let Some(node) = ctx.graph.get(name) else {
                    continue;
                };
                // an unpublished package has no tag of its own
                let described = ctx
                    .git
                    .describe_ref(&format!("{}@*", name), self.include_merged_tags)?;
                if let Some(version) = self.version_from(&described, node.version())? {
                    set.insert(node, version);
                }
            }
        } else if !candidates.is_empty() {
            let described = ctx
                .git
                .describe_ref(&self.repo_pattern(), self.include_merged_tags)?;
            for name in &candidates {
                let Some(node) = ctx.graph.get(name) else {
                    continue;
                };
                let fallback = self.fixed_version.as_ref().or(node.version());
                if let Some(version) = self.version_from(&described, fallback)? {
                    set.insert(node, version);
                }
            }
        }

        for entry in set.iter() {
            debug!(package = %entry.name, version = %entry.version, "canary version");
        }
        Ok(ResolveOutcome::automatic(set, ctx.yes))
    }
}
