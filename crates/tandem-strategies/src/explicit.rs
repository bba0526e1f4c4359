//! Externally decided versions

use std::collections::BTreeMap;

use async_trait::async_trait;
use semver::Version;

use tandem_core::error::{Result, ValidationError};
use tandem_core::monorepo::{DependencyGraph, ReleaseSet};
use tandem_core::types::ReleaseType;

use crate::increment::increment;
use crate::traits::{ResolveContext, ResolveOutcome, VersionResolver};

/// Resolver for `explicit-bump`: a version per package handed in by the
/// caller, which already obtained consent for it
#[derive(Debug, Clone, Default)]
pub struct Explicit {
    versions: BTreeMap<String, Version>,
}

impl Explicit {
    pub fn new(versions: impl IntoIterator<Item = (String, Version)>) -> Self {
        Self {
            versions: versions.into_iter().collect(),
        }
    }

    /// Bump every public package in the graph by the same release type
    pub fn from_bump(graph: &DependencyGraph, bump: ReleaseType, preid: Option<&str>) -> Result<Self> {
        let mut versions = BTreeMap::new();
        for node in graph.packages().filter(|p| !p.is_private()) {
            if let Some(current) = node.version() {
                versions.insert(node.name().to_string(), increment(current, bump, preid)?);
            }
        }
        Ok(Self { versions })
    }
}

#[async_trait]
impl VersionResolver for Explicit {
    fn name(&self) -> &'static str {
        "explicit-bump"
    }

    async fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<ResolveOutcome> {
        let mut set = ReleaseSet::new();
        for name in self.versions.keys() {
            if !ctx.graph.contains(name) {
                return Err(ValidationError::UnknownPackage(name.clone()).into());
            }
        }
        // declaration order, not map order
        for node in ctx.graph.packages() {
            if let Some(version) = self.versions.get(node.name()) {
                set.insert(node, version.clone());
            }
        }

        Ok(ResolveOutcome {
            release_set: set,
            needs_confirmation: false,
        })
    }
}
