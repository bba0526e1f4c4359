//! Working tree checks shared by the resolvers

use tracing::{info, warn};

use tandem_core::error::{GitError, Result, WorkingTreeError};
use tandem_core::traits::GitClient;

/// Require a clean working tree
pub fn require_clean(git: &dyn GitClient) -> Result<()> {
    match git.ensure_clean() {
        Ok(()) => Ok(()),
        Err(GitError::DirtyWorkingDirectory) => Err(WorkingTreeError::UncommittedChanges.into()),
        Err(e) => Err(e.into()),
    }
}

/// Require a clean working tree when git is usable.
///
/// Without a repository the check is skipped with a notice; a dirty tree
/// or any other failure is still fatal.
pub fn require_clean_if_repository(git: &dyn GitClient) -> Result<()> {
    match git.ensure_clean() {
        Ok(()) => Ok(()),
        Err(GitError::NotARepository(path)) => {
            warn!(path = %path.display(), "unable to verify working tree, proceeding without git");
            Ok(())
        }
        Err(GitError::NoCommits) => {
            info!("repository has no commits, skipping working tree check");
            Ok(())
        }
        Err(GitError::DirtyWorkingDirectory) => Err(WorkingTreeError::UncommittedChanges.into()),
        Err(e) => Err(e.into()),
    }
}
