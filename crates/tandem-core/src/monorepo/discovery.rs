//! Package discovery in monorepos

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glob::glob;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ConfigError, Result};

use super::graph::DependencyGraph;
use super::manifest::{PackageManifest, MANIFEST_FILE};
use super::package::PackageNode;

/// Package discovery from location globs
pub struct PackageDiscovery {
    root: PathBuf,
    patterns: Vec<String>,
}

impl PackageDiscovery {
    /// Create a new package discovery instance
    pub fn new(root: impl Into<PathBuf>, patterns: Vec<String>) -> Self {
        Self {
            root: root.into(),
            patterns,
        }
    }

    /// Monorepo root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discover all packages, in pattern order then path order
    pub fn discover(&self) -> Result<Vec<PackageNode>> {
        debug!(root = %self.root.display(), patterns = self.patterns.len(), "discovering packages");
        let mut packages = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();

        for pattern in &self.patterns {
            let full_pattern = self.root.join(pattern).join(MANIFEST_FILE);
            let full_pattern = full_pattern.to_string_lossy();
            let entries = glob(&full_pattern).map_err(|e| ConfigError::InvalidValue {
                field: "packages".to_string(),
                message: format!("invalid glob '{}': {}", pattern, e),
            })?;

            for entry in entries {
                let manifest_path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        warn!(error = %e, "skipping unreadable path");
                        continue;
                    }
                };
                if manifest_path.components().any(|c| c.as_os_str() == "node_modules") {
                    continue;
                }
                if !seen.insert(manifest_path.clone()) {
                    continue;
                }

                let manifest = PackageManifest::load(&manifest_path)?;
                let node = PackageNode::new(manifest_path, manifest)?;
                debug!(package = node.name(), location = %node.location().display(), "found package");
                packages.push(node);
            }
        }

        info!(count = packages.len(), "discovered packages");
        Ok(packages)
    }
}

/// Discover packages under `root` and build their dependency graph
pub fn load_graph(root: &Path, config: &Config) -> Result<DependencyGraph> {
    let packages = PackageDiscovery::new(root, config.packages.clone()).discover()?;
    DependencyGraph::build(packages, config.publish.graph_type)
}
