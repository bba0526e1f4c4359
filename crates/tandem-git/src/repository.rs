//! Git repository operations

use std::path::{Path, PathBuf};

use git2::Repository;
use tracing::{debug, instrument};

use tandem_core::error::GitError;

/// Result type for git operations
pub type Result<T> = std::result::Result<T, GitError>;

/// Git repository wrapper
pub struct GitRepo {
    pub(crate) repo: Repository,
    path: PathBuf,
}

impl GitRepo {
    /// Discover and open a repository by searching parent directories
    #[instrument(fields(start_path = %start_path.display()))]
    pub fn discover(start_path: &Path) -> Result<Self> {
        debug!(start_path = %start_path.display(), "discovering git repository");
        let repo = Repository::discover(start_path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                GitError::NotARepository(start_path.to_path_buf())
            } else {
                GitError::Git2(e)
            }
        })?;

        let path = repo
            .workdir()
            .ok_or_else(|| GitError::NotARepository(start_path.to_path_buf()))?
            .to_path_buf();

        Ok(Self { repo, path })
    }

    /// Get the working directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a reference to the inner git2 Repository
    pub fn inner(&self) -> &Repository {
        &self.repo
    }

    /// Get the HEAD commit
    pub fn head_commit(&self) -> Result<git2::Commit<'_>> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Err(GitError::NoCommits),
            Err(e) => return Err(e.into()),
        };
        head.peel_to_commit().map_err(GitError::Git2)
    }

    /// Express `path` relative to the working directory.
    ///
    /// Falls back to canonical paths so symlinked temp dirs still match.
    pub fn relative_path(&self, path: &Path) -> Option<PathBuf> {
        if path.is_relative() {
            return Some(path.to_path_buf());
        }
        if let Ok(rel) = path.strip_prefix(&self.path) {
            return Some(rel.to_path_buf());
        }
        let workdir = self.path.canonicalize().ok()?;
        let path = path.canonicalize().ok()?;
        path.strip_prefix(workdir).ok().map(Path::to_path_buf)
    }
}
