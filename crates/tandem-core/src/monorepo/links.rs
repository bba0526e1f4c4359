//! Rewriting of sibling dependency specifiers before publish

use globset::{Glob, GlobSet, GlobSetBuilder};
use semver::Version;
use tracing::debug;

use crate::error::{ConfigError, Result};

use super::graph::DependencyGraph;
use super::manifest::DependencyKind;
use super::package::LocalSpec;
use super::release_set::ReleaseSet;
use super::specifier::WorkspaceRange;

/// Which local dependencies get rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkScope {
    /// Directory links and `workspace:` specifiers
    Links,
    /// Every local dependency, including plain ranges (canary releases)
    All,
}

/// A planned specifier change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// Package whose manifest changes
    pub package: String,
    /// Dependency field
    pub kind: DependencyKind,
    /// Sibling being depended on
    pub dependency: String,
    /// Specifier before
    pub from: String,
    /// Specifier after
    pub to: String,
}

/// Computes and applies local link rewrites
#[derive(Debug, Clone)]
pub struct LocalLinkResolver {
    save_prefix: &'static str,
    preserve: GlobSet,
}

impl LocalLinkResolver {
    /// Create a resolver; `exact` drops the `^` save prefix, `preserve`
    /// lists dependency name globs that are never rewritten
    pub fn new(exact: bool, preserve: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in preserve {
            let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidValue {
                field: "publish.local_links.preserve".to_string(),
                message: format!("invalid glob '{}': {}", pattern, e),
            })?;
            builder.add(glob);
        }
        let preserve = builder.build().map_err(|e| ConfigError::InvalidValue {
            field: "publish.local_links.preserve".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            save_prefix: if exact { "" } else { "^" },
            preserve,
        })
    }

    /// `""` in exact mode, `"^"` otherwise
    pub fn save_prefix(&self) -> &str {
        self.save_prefix
    }

    /// Plan rewrites for every package in `packages`.
    ///
    /// A dependency resolves to its release version when it is part of the
    /// release, otherwise to its current graph version.
    pub fn plan(
        &self,
        graph: &DependencyGraph,
        packages: &[String],
        release: &ReleaseSet,
        scope: LinkScope,
    ) -> Vec<Rewrite> {
        let mut rewrites = Vec::new();

        for name in packages {
            let Some(node) = graph.get(name) else {
                continue;
            };
            for dep in node.local_dependencies() {
                if self.preserve.is_match(&dep.name) {
                    debug!(package = %name, dependency = %dep.name, "preserving specifier");
                    continue;
                }
                let Some(version) = release
                    .version_of(&dep.name)
                    .or_else(|| graph.get(&dep.name).and_then(|n| n.version()))
                else {
                    continue;
                };
                let Some(to) = self.rewrite(&dep.spec, version, scope) else {
                    continue;
                };
                if to != dep.raw {
                    rewrites.push(Rewrite {
                        package: name.clone(),
                        kind: dep.kind,
                        dependency: dep.name.clone(),
                        from: dep.raw.clone(),
                        to,
                    });
                }
            }
        }

        rewrites
    }

    fn rewrite(&self, spec: &LocalSpec, version: &Version, scope: LinkScope) -> Option<String> {
        match spec {
            LocalSpec::Directory => Some(format!("{}{}", self.save_prefix, version)),
            LocalSpec::Workspace(range) => Some(match range {
                WorkspaceRange::Any => version.to_string(),
                WorkspaceRange::Caret => format!("^{}", version),
                WorkspaceRange::Tilde => format!("~{}", version),
                WorkspaceRange::Range(r) if scope == LinkScope::All => {
                    format!("{}{}", range_operator(r), version)
                }
                WorkspaceRange::Range(r) => r.clone(),
            }),
            LocalSpec::Range if scope == LinkScope::All => {
                Some(format!("{}{}", self.save_prefix, version))
            }
            LocalSpec::Range => None,
        }
    }

    /// Apply planned rewrites to the in-memory manifests
    pub fn apply(graph: &mut DependencyGraph, rewrites: &[Rewrite]) {
        for rewrite in rewrites {
            if let Some(node) = graph.get_mut(&rewrite.package) {
                debug!(
                    package = %rewrite.package,
                    dependency = %rewrite.dependency,
                    from = %rewrite.from,
                    to = %rewrite.to,
                    "rewriting local dependency"
                );
                node.set_dependency_spec(rewrite.kind, &rewrite.dependency, &rewrite.to);
            }
        }
    }
}

fn range_operator(range: &str) -> &str {
    let end = range
        .find(|c: char| !matches!(c, '^' | '~' | '>' | '<' | '='))
        .unwrap_or(range.len());
    &range[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monorepo::graph::tests::{node, node_with};
    use crate::types::GraphType;

    fn graph() -> DependencyGraph {
        DependencyGraph::build(
            vec![
                node("core", "2.0.0", &[]),
                node_with("lib", "1.0.0", "peerDependencies", &[("core", "file:../core")], false),
                node(
                    "app",
                    "1.0.0",
                    &[
                        ("core", "file:../core"),
                        ("lib", "workspace:*"),
                        ("@types/x", "file:../x"),
                    ],
                ),
                node("ranged", "1.0.0", &[("core", "^2.0.0")]),
            ],
            GraphType::Dependencies,
        )
        .unwrap()
    }

    fn all_names(graph: &DependencyGraph) -> Vec<String> {
        graph.packages().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn test_directory_link_uses_save_prefix() {
        let graph = graph();
        let resolver = LocalLinkResolver::new(false, &[]).unwrap();
        let rewrites = resolver.plan(&graph, &["app".to_string()], &ReleaseSet::new(), LinkScope::Links);

        let core = rewrites.iter().find(|r| r.dependency == "core").unwrap();
        assert_eq!(core.to, "^2.0.0");
        let lib = rewrites.iter().find(|r| r.dependency == "lib").unwrap();
        assert_eq!(lib.to, "1.0.0");
    }

    #[test]
    fn test_exact_mode_has_no_prefix() {
        let graph = graph();
        let resolver = LocalLinkResolver::new(true, &[]).unwrap();
        let rewrites = resolver.plan(&graph, &["app".to_string()], &ReleaseSet::new(), LinkScope::Links);
        assert_eq!(
            rewrites.iter().find(|r| r.dependency == "core").unwrap().to,
            "2.0.0"
        );
    }

    #[test]
    fn test_release_version_wins_over_graph_version() {
        let graph = graph();
        let mut release = ReleaseSet::new();
        release.insert(graph.get("core").unwrap(), Version::new(3, 0, 0));

        let resolver = LocalLinkResolver::new(false, &[]).unwrap();
        let rewrites = resolver.plan(&graph, &["lib".to_string()], &release, LinkScope::Links);
        assert_eq!(rewrites.len(), 1);
        assert_eq!(rewrites[0].kind, DependencyKind::Peer);
        assert_eq!(rewrites[0].to, "^3.0.0");
    }

    #[test]
    fn test_plain_ranges_only_rewritten_in_all_scope() {
        let graph = graph();
        let mut release = ReleaseSet::new();
        release.insert(graph.get("core").unwrap(), Version::parse("2.0.1-alpha.0").unwrap());
        let resolver = LocalLinkResolver::new(false, &[]).unwrap();
        let ranged = vec!["ranged".to_string()];

        assert!(resolver.plan(&graph, &ranged, &release, LinkScope::Links).is_empty());
        let all = resolver.plan(&graph, &ranged, &release, LinkScope::All);
        assert_eq!(all[0].to, "^2.0.1-alpha.0");
    }

    #[test]
    fn test_preserve_globs_keep_specifier() {
        let graph = graph();
        let resolver = LocalLinkResolver::new(false, &["co*".to_string()]).unwrap();
        let rewrites = resolver.plan(&graph, &all_names(&graph), &ReleaseSet::new(), LinkScope::Links);
        assert!(rewrites.iter().all(|r| r.dependency != "core"));
    }

    #[test]
    fn test_apply_mutates_manifest() {
        let mut graph = graph();
        let resolver = LocalLinkResolver::new(false, &[]).unwrap();
        let rewrites = resolver.plan(&graph, &all_names(&graph), &ReleaseSet::new(), LinkScope::Links);
        LocalLinkResolver::apply(&mut graph, &rewrites);

        let app = graph.get("app").unwrap().manifest();
        assert_eq!(app.dependency(DependencyKind::Regular, "core"), Some("^2.0.0"));
        assert_eq!(app.dependency(DependencyKind::Regular, "lib"), Some("1.0.0"));
        // not a sibling in this graph, left untouched
        assert_eq!(app.dependency(DependencyKind::Regular, "@types/x"), Some("file:../x"));
    }

    #[test]
    fn test_range_operator() {
        assert_eq!(range_operator("^1.2.0"), "^");
        assert_eq!(range_operator(">=1.0.0"), ">=");
        assert_eq!(range_operator("1.0.0"), "");
    }
}
