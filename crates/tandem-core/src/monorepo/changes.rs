//! Mapping changed files to packages

use std::path::{Path, PathBuf};

use tracing::debug;

use super::graph::DependencyGraph;

/// Packages owning any of `files`, plus their transitive dependents.
///
/// `files` are relative to `root` (as git reports them). Each file belongs
/// to the package with the deepest matching location.
pub fn changed_packages(graph: &DependencyGraph, root: &Path, files: &[PathBuf]) -> Vec<String> {
    let mut direct: Vec<String> = Vec::new();

    for file in files {
        let absolute = root.join(file);
        let owner = graph
            .packages()
            .filter(|p| absolute.starts_with(p.location()))
            .max_by_key(|p| p.location().components().count());
        if let Some(owner) = owner {
            if !direct.iter().any(|n| n == owner.name()) {
                debug!(file = %file.display(), package = owner.name(), "file changed");
                direct.push(owner.name().to_string());
            }
        }
    }

    graph.with_dependents(&direct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monorepo::graph::tests::node;
    use crate::types::GraphType;

    #[test]
    fn test_changed_files_map_to_packages_and_dependents() {
        let graph = DependencyGraph::build(
            vec![
                node("core", "1.0.0", &[]),
                node("lib", "1.0.0", &[("core", "^1.0.0")]),
                node("other", "1.0.0", &[]),
            ],
            GraphType::Dependencies,
        )
        .unwrap();

        let changed = changed_packages(
            &graph,
            Path::new("/repo"),
            &[
                PathBuf::from("packages/core/src/index.js"),
                PathBuf::from("README.md"),
            ],
        );
        assert_eq!(changed, vec!["core", "lib"]);
    }
}
