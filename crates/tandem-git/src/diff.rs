//! Changed-file queries and restoring files

use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{DiffOptions, Tree};
use tracing::{debug, instrument};

use tandem_core::error::GitError;

use crate::repository::{GitRepo, Result};

impl GitRepo {
    /// Files touched by the HEAD commit (all files for a root commit)
    #[instrument(skip(self))]
    pub fn files_changed_in_head(&self) -> Result<Vec<PathBuf>> {
        let head = self.head_commit()?;
        let parent_tree = match head.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };
        self.diff_trees(parent_tree.as_ref(), &head.tree()?)
    }

    /// Files changed between `reference` and HEAD
    #[instrument(skip(self))]
    pub fn files_changed_since(&self, reference: &str) -> Result<Vec<PathBuf>> {
        let from = self
            .repo
            .revparse_single(reference)
            .map_err(|_| GitError::UnknownReference(reference.to_string()))?
            .peel_to_tree()?;
        let head = self.head_commit()?;
        self.diff_trees(Some(&from), &head.tree()?)
    }

    fn diff_trees(&self, old: Option<&Tree<'_>>, new: &Tree<'_>) -> Result<Vec<PathBuf>> {
        let mut opts = DiffOptions::new();
        let diff = self
            .repo
            .diff_tree_to_tree(old, Some(new), Some(&mut opts))?;

        let mut files = Vec::new();
        for delta in diff.deltas() {
            if let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) {
                files.push(path.to_path_buf());
            }
        }
        debug!(count = files.len(), "changed files");
        Ok(files)
    }

    /// Restore files to their HEAD contents
    #[instrument(skip(self, paths), fields(count = paths.len()))]
    pub fn checkout_paths(&self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut builder = CheckoutBuilder::new();
        builder.force();
        for path in paths {
            let relative = self
                .relative_path(path)
                .ok_or_else(|| GitError::UnknownReference(path.display().to_string()))?;
            builder.path(relative_str(&relative));
        }
        self.repo.checkout_head(Some(&mut builder))?;
        Ok(())
    }
}

fn relative_str(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
