//! Monorepo model: manifests, the package graph and release selection

pub mod changes;
pub mod discovery;
pub mod graph;
pub mod links;
pub mod manifest;
pub mod package;
pub mod release_set;
pub mod specifier;

pub use changes::changed_packages;
pub use discovery::{load_graph, PackageDiscovery};
pub use graph::DependencyGraph;
pub use links::{LinkScope, LocalLinkResolver, Rewrite};
pub use manifest::{DependencyKind, PackageManifest, MANIFEST_FILE};
pub use package::{LocalDependency, LocalSpec, PackageNode, PackedArtifact};
pub use release_set::{ReleaseEntry, ReleaseSet};
pub use specifier::Specifier;
