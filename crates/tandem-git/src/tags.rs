//! Tag operations

use semver::Version;
use tracing::{debug, instrument};

use crate::repository::{GitRepo, Result};

impl GitRepo {
    /// Tags matching a glob that point at HEAD, in version order
    #[instrument(skip(self))]
    pub fn tags_at_head(&self, pattern: &str) -> Result<Vec<String>> {
        let head = self.head_commit()?.id();
        let names = self.repo.tag_names(Some(pattern))?;

        let mut tags: Vec<String> = Vec::new();
        for name in names.iter().flatten() {
            let reference = match self.repo.find_reference(&format!("refs/tags/{}", name)) {
                Ok(r) => r,
                Err(_) => continue,
            };
            let target = match reference.peel_to_commit() {
                Ok(commit) => commit.id(),
                Err(_) => continue,
            };
            if target == head {
                tags.push(name.to_string());
            }
        }

        tags.sort_by(|a, b| match (tag_version(a), tag_version(b)) {
            (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
            _ => a.cmp(b),
        });
        debug!(count = tags.len(), "tags at HEAD");
        Ok(tags)
    }
}

fn tag_version(tag: &str) -> Option<Version> {
    let raw = tag.rsplit('@').next().unwrap_or(tag);
    Version::parse(raw.trim_start_matches('v')).ok()
}
