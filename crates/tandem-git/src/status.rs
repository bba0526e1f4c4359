//! Repository status operations

use git2::StatusOptions;

use crate::repository::{GitRepo, Result};

impl GitRepo {
    /// Check that tracked files have no uncommitted changes.
    ///
    /// Untracked files do not make the tree dirty.
    pub fn is_clean(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;

        for entry in statuses.iter() {
            let status = entry.status();
            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
                || status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Check if HEAD is detached
    pub fn is_head_detached(&self) -> Result<bool> {
        Ok(self.repo.head_detached()?)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::testing;
    use crate::repository::GitRepo;

    #[test]
    fn test_is_clean() {
        let (temp, repo) = testing::init();
        testing::commit_file(&repo, "file.txt", "content", "Initial commit");
        let git = GitRepo::discover(temp.path()).unwrap();
        assert!(git.is_clean().unwrap());
        assert!(!git.is_head_detached().unwrap());
    }

    #[test]
    fn test_untracked_files_do_not_count() {
        let (temp, repo) = testing::init();
        testing::commit_file(&repo, "file.txt", "content", "Initial commit");
        std::fs::write(temp.path().join("new_file.txt"), "new").unwrap();
        let git = GitRepo::discover(temp.path()).unwrap();
        assert!(git.is_clean().unwrap());
    }

    #[test]
    fn test_modified_file_is_dirty() {
        let (temp, repo) = testing::init();
        testing::commit_file(&repo, "file.txt", "content", "Initial commit");
        std::fs::write(temp.path().join("file.txt"), "modified").unwrap();
        let git = GitRepo::discover(temp.path()).unwrap();
        assert!(!git.is_clean().unwrap());
    }
}
