//! State threaded through the stages of one run

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use tandem_core::monorepo::{DependencyGraph, ReleaseSet};
use tandem_core::types::PublishedPackage;

use crate::license::StagedLicenses;
use crate::otp::OtpCache;

/// Everything the stages read and write.
///
/// The graph is only mutated between runner passes; each pass works on a
/// snapshot taken by [`snapshot`](PublishContext::snapshot).
pub struct PublishContext {
    pub graph: DependencyGraph,
    pub release: ReleaseSet,
    /// Release set in dependency order
    pub order: Vec<String>,
    pub otp: Arc<OtpCache>,
    pub two_factor_required: bool,
    pub licenses: StagedLicenses,
    /// Manifests written to disk by this run
    pub written: Vec<PathBuf>,
    /// Holds the tarballs until publishing is done
    pub tarballs: Option<TempDir>,
    pub published: Vec<PublishedPackage>,
}

impl PublishContext {
    pub fn new(graph: DependencyGraph, release: ReleaseSet, otp: Arc<OtpCache>) -> Self {
        let order = release.topological_names(&graph);
        Self {
            graph,
            release,
            order,
            otp,
            two_factor_required: false,
            licenses: StagedLicenses::default(),
            written: Vec::new(),
            tarballs: None,
            published: Vec::new(),
        }
    }

    /// Read-only copy of the graph for a runner pass
    pub fn snapshot(&self) -> Arc<DependencyGraph> {
        Arc::new(self.graph.clone())
    }

    /// Dependency edges between the packages being released
    pub fn edges(&self) -> Vec<(String, Vec<String>)> {
        self.graph.induced_edges(&self.order)
    }
}
