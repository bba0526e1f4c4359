//! Which dist tag each package is published and promoted under

use semver::Version;

use tandem_core::config::{DEFAULT_DIST_TAG, TEMP_DIST_TAG};

use crate::options::PublishOptions;

/// Per-package dist tag decisions, computed on demand
#[derive(Debug, Clone, Default)]
pub struct DistTagPlan {
    /// `--dist-tag`, or `canary` for canary releases
    base: Option<String>,
    pre_dist_tag: Option<String>,
    temp_tag: bool,
}

impl DistTagPlan {
    pub fn new(base: Option<String>, pre_dist_tag: Option<String>, temp_tag: bool) -> Self {
        Self {
            base,
            pre_dist_tag,
            temp_tag,
        }
    }

    pub fn from_options(options: &PublishOptions) -> Self {
        Self::new(options.base_dist_tag(), options.pre_dist_tag.clone(), options.temp_tag)
    }

    fn pre_release_tag(&self, version: &Version) -> Option<&str> {
        self.pre_dist_tag
            .as_deref()
            .filter(|_| !version.pre.is_empty())
    }

    /// The run-wide tag: explicit, `canary`, or `latest`
    pub fn run_tag(&self) -> &str {
        self.base.as_deref().unwrap_or(DEFAULT_DIST_TAG)
    }

    /// Tag for the publish call itself.
    ///
    /// With a temporary tag every package goes out under it, and the
    /// pre-release tag is only applied by [`promotion_tag`](Self::promotion_tag).
    /// Otherwise a prerelease takes the pre-release tag, then the run tag or
    /// `publishConfig.tag` apply.
    pub fn publish_tag(&self, version: &Version, manifest_tag: Option<&str>) -> String {
        if self.temp_tag {
            return TEMP_DIST_TAG.to_string();
        }
        if let Some(tag) = self.pre_release_tag(version) {
            return tag.to_string();
        }
        match (&self.base, manifest_tag) {
            (Some(base), _) => base.clone(),
            (None, Some(tag)) => tag.to_string(),
            (None, None) => DEFAULT_DIST_TAG.to_string(),
        }
    }

    /// Tag the temporary tag is swapped for after every publish succeeded
    pub fn promotion_tag(&self, version: &Version, manifest_tag: Option<&str>) -> String {
        if let Some(tag) = self.pre_release_tag(version) {
            return tag.to_string();
        }
        let run_tag = self.run_tag();
        match manifest_tag {
            Some(tag) if run_tag == DEFAULT_DIST_TAG => tag.to_string(),
            _ => run_tag.to_string(),
        }
    }
}
