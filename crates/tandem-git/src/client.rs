//! `GitClient` backed by git2

use std::path::{Path, PathBuf};

use tracing::debug;

use tandem_core::error::GitError;
use tandem_core::traits::{DescribeResult, GitClient};

use crate::repository::{GitRepo, Result};

/// Git collaborator for a monorepo root.
///
/// The repository is opened per call so the client stays `Send + Sync`.
#[derive(Debug, Clone)]
pub struct Git {
    root: PathBuf,
}

impl Git {
    /// Client for the repository containing `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn open(&self) -> Result<GitRepo> {
        GitRepo::discover(&self.root)
    }
}

impl GitClient for Git {
    fn root(&self) -> &Path {
        &self.root
    }

    fn describe_ref(&self, pattern: &str, include_merged_tags: bool) -> Result<DescribeResult> {
        self.open()?.describe(pattern, include_merged_tags)
    }

    fn current_tags(&self, pattern: &str) -> Result<Vec<String>> {
        self.open()?.tags_at_head(pattern)
    }

    fn checkout(&self, paths: &[PathBuf]) -> Result<()> {
        self.open()?.checkout_paths(paths)
    }

    fn current_sha(&self) -> Result<String> {
        Ok(self.open()?.head_commit()?.id().to_string())
    }

    fn ensure_clean(&self) -> Result<()> {
        let repo = self.open()?;
        if repo.is_clean()? {
            debug!("working tree is clean");
            Ok(())
        } else {
            Err(GitError::DirtyWorkingDirectory)
        }
    }

    fn files_changed_in_head(&self) -> Result<Vec<PathBuf>> {
        let repo = self.open()?;
        let prefix = self.root_prefix(&repo);
        Ok(strip_files(repo.files_changed_in_head()?, prefix.as_deref()))
    }

    fn files_changed_since(&self, reference: &str) -> Result<Vec<PathBuf>> {
        let repo = self.open()?;
        let prefix = self.root_prefix(&repo);
        Ok(strip_files(repo.files_changed_since(reference)?, prefix.as_deref()))
    }
}

impl Git {
    /// The monorepo root relative to the repository workdir, when nested
    fn root_prefix(&self, repo: &GitRepo) -> Option<PathBuf> {
        repo.relative_path(&self.root)
            .filter(|p| !p.as_os_str().is_empty())
    }
}

/// Re-express repository-relative paths relative to the monorepo root,
/// dropping files outside it
fn strip_files(files: Vec<PathBuf>, prefix: Option<&Path>) -> Vec<PathBuf> {
    match prefix {
        None => files,
        Some(prefix) => files
            .into_iter()
            .filter_map(|f| f.strip_prefix(prefix).ok().map(Path::to_path_buf))
            .collect(),
    }
}
