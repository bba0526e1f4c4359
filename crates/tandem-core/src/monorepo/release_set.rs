//! Packages selected for a release, paired with their target versions

use semver::Version;
use tracing::debug;

use super::graph::DependencyGraph;
use super::package::PackageNode;

/// A package chosen for release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEntry {
    /// Package name
    pub name: String,
    /// Version the package is released as
    pub version: Version,
}

/// The release set. Never contains a private package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseSet {
    entries: Vec<ReleaseEntry>,
}

impl ReleaseSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package; private packages and duplicates are skipped.
    ///
    /// Returns whether the package was added.
    pub fn insert(&mut self, node: &PackageNode, version: Version) -> bool {
        if node.is_private() {
            debug!(package = node.name(), "skipping private package");
            return false;
        }
        if self.contains(node.name()) {
            return false;
        }
        self.entries.push(ReleaseEntry {
            name: node.name().to_string(),
            version,
        });
        true
    }

    /// Build a set of packages released at their current manifest version
    pub fn at_current_versions<'a>(packages: impl IntoIterator<Item = &'a PackageNode>) -> Self {
        let mut set = Self::new();
        for node in packages {
            if let Some(version) = node.version() {
                set.insert(node, version.clone());
            }
        }
        set
    }

    /// Target version of a package
    pub fn version_of(&self, name: &str) -> Option<&Version> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.version)
    }

    /// Whether a package is part of the release
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ReleaseEntry> {
        self.entries.iter()
    }

    /// Package names in insertion order
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Package names ordered dependencies first
    pub fn topological_names(&self, graph: &DependencyGraph) -> Vec<String> {
        graph
            .topological_order()
            .into_iter()
            .filter(|n| self.contains(n))
            .collect()
    }

    /// Number of packages
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is to be released
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monorepo::graph::tests::{node, node_with};

    #[test]
    fn test_private_packages_never_enter() {
        let public = node("pub", "1.0.0", &[]);
        let private = node_with("priv", "1.0.0", "dependencies", &[], true);

        let mut set = ReleaseSet::new();
        assert!(set.insert(&public, Version::new(1, 1, 0)));
        assert!(!set.insert(&private, Version::new(1, 1, 0)));
        assert_eq!(set.names(), vec!["pub"]);
    }

    #[test]
    fn test_at_current_versions() {
        let a = node("a", "1.2.3", &[]);
        let b = node_with("b", "0.1.0", "dependencies", &[], true);
        let set = ReleaseSet::at_current_versions([&a, &b]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.version_of("a"), Some(&Version::new(1, 2, 3)));
    }
}
