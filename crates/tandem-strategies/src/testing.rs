//! In-memory collaborators for resolver tests

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semver::Version;

use tandem_core::error::{GitError, RegistryError, Result};
use tandem_core::monorepo::{DependencyGraph, PackageManifest, PackageNode};
use tandem_core::traits::{DescribeResult, GitClient, PublishRequest, RegistryClient};
use tandem_core::types::GraphType;

pub enum CleanState {
    Clean,
    Dirty,
    NoRepository,
}

pub struct FakeGit {
    pub clean: CleanState,
    pub tags_at_head: Vec<String>,
    pub head_files: Vec<PathBuf>,
    pub changed_since: Vec<PathBuf>,
    /// Describe results by pattern
    pub describe: HashMap<String, DescribeResult>,
    pub sha: String,
}

impl FakeGit {
    pub fn new() -> Self {
        Self {
            clean: CleanState::Clean,
            tags_at_head: Vec::new(),
            head_files: Vec::new(),
            changed_since: Vec::new(),
            describe: HashMap::new(),
            sha: "abcd1234ef".to_string(),
        }
    }

    pub fn with_tag(mut self, pattern: &str, last_version: &str, ref_count: u64) -> Self {
        self.describe.insert(
            pattern.to_string(),
            DescribeResult {
                last_tag_name: Some(last_version.to_string()),
                last_version: Some(last_version.rsplit('@').next().unwrap().to_string()),
                ref_count,
                sha: "abcd123".to_string(),
                is_dirty: false,
            },
        );
        self
    }
}

impl GitClient for FakeGit {
    fn root(&self) -> &Path {
        Path::new("/repo")
    }

    fn describe_ref(&self, pattern: &str, _include_merged_tags: bool) -> std::result::Result<DescribeResult, GitError> {
        Ok(self.describe.get(pattern).cloned().unwrap_or(DescribeResult {
            last_tag_name: None,
            last_version: None,
            ref_count: 7,
            sha: "abcd123".to_string(),
            is_dirty: false,
        }))
    }

    fn current_tags(&self, pattern: &str) -> std::result::Result<Vec<String>, GitError> {
        let wants_independent = pattern.contains('@');
        Ok(self
            .tags_at_head
            .iter()
            .filter(|t| t.contains('@') == wants_independent)
            .cloned()
            .collect())
    }

    fn checkout(&self, _paths: &[PathBuf]) -> std::result::Result<(), GitError> {
        Ok(())
    }

    fn current_sha(&self) -> std::result::Result<String, GitError> {
        Ok(self.sha.clone())
    }

    fn ensure_clean(&self) -> std::result::Result<(), GitError> {
        match self.clean {
            CleanState::Clean => Ok(()),
            CleanState::Dirty => Err(GitError::DirtyWorkingDirectory),
            CleanState::NoRepository => Err(GitError::NotARepository(PathBuf::from("/repo"))),
        }
    }

    fn files_changed_in_head(&self) -> std::result::Result<Vec<PathBuf>, GitError> {
        Ok(self.head_files.clone())
    }

    fn files_changed_since(&self, _reference: &str) -> std::result::Result<Vec<PathBuf>, GitError> {
        Ok(self.changed_since.clone())
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    /// `name@version` specs already published
    pub published: HashSet<String>,
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    fn registry_url(&self) -> &str {
        "https://registry.npmjs.org/"
    }

    async fn username(&self) -> std::result::Result<Option<String>, RegistryError> {
        Ok(Some("tester".to_string()))
    }

    async fn package_access(&self, _packages: &[String], _username: &str) -> Result<()> {
        Ok(())
    }

    async fn two_factor_required(&self) -> std::result::Result<bool, RegistryError> {
        Ok(false)
    }

    async fn is_published(&self, name: &str, version: &Version) -> std::result::Result<bool, RegistryError> {
        Ok(self.published.contains(&format!("{}@{}", name, version)))
    }

    async fn publish(&self, _request: &PublishRequest, _otp: Option<&str>) -> std::result::Result<(), RegistryError> {
        Ok(())
    }

    async fn add_dist_tag(&self, _spec: &str, _tag: &str, _otp: Option<&str>) -> std::result::Result<(), RegistryError> {
        Ok(())
    }

    async fn remove_dist_tag(&self, _spec: &str, _tag: &str, _otp: Option<&str>) -> std::result::Result<(), RegistryError> {
        Ok(())
    }
}

/// `(name, version, private, dependencies)` rows to a graph under `/repo/packages`
pub fn graph(rows: &[(&str, &str, bool, &[&str])]) -> DependencyGraph {
    let nodes = rows
        .iter()
        .map(|(name, version, private, deps)| {
            let deps: serde_json::Map<String, serde_json::Value> = deps
                .iter()
                .map(|d| (d.to_string(), serde_json::Value::String("*".to_string())))
                .collect();
            let doc = serde_json::json!({
                "name": name,
                "version": version,
                "private": private,
                "dependencies": deps,
            });
            let manifest = PackageManifest::parse(&doc.to_string()).unwrap();
            PackageNode::new(format!("/repo/packages/{}/package.json", name), manifest).unwrap()
        })
        .collect();
    DependencyGraph::build(nodes, GraphType::Dependencies).unwrap()
}
