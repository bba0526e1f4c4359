//! The ordered stage list of a publish run

use crate::options::PublishOptions;

/// One step of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Credentials, package access and the account's 2FA setting
    Preflight,
    /// Copy the root license into packages that lack one
    StageLicenses,
    /// Write release versions into manifests; canary releases also pin
    /// every local dependency to them
    ApplyVersions,
    /// Rewrite directory and `workspace:` links to versions
    ResolveLocalLinks,
    /// Record the commit in each manifest
    AnnotateGitHead,
    /// Flush manifest changes to disk
    Serialize,
    /// Produce tarballs, dependencies first
    Pack,
    /// Upload tarballs, dependencies first
    Publish,
    /// Restore manifests to their committed contents
    ResetWorkingTree,
    /// Swap the temporary dist tag for the real one
    PromoteTempTag,
}

impl Stage {
    /// Every stage in execution order
    pub const ALL: [Stage; 10] = [
        Self::Preflight,
        Self::StageLicenses,
        Self::ApplyVersions,
        Self::ResolveLocalLinks,
        Self::AnnotateGitHead,
        Self::Serialize,
        Self::Pack,
        Self::Publish,
        Self::ResetWorkingTree,
        Self::PromoteTempTag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::StageLicenses => "licenses",
            Self::ApplyVersions => "versions",
            Self::ResolveLocalLinks => "local-links",
            Self::AnnotateGitHead => "git-head",
            Self::Serialize => "serialize",
            Self::Pack => "pack",
            Self::Publish => "publish",
            Self::ResetWorkingTree => "reset",
            Self::PromoteTempTag => "promote",
        }
    }

    /// Whether the options call for this stage
    pub fn enabled(&self, options: &PublishOptions) -> bool {
        match self {
            Self::ResetWorkingTree => options.git_reset,
            Self::PromoteTempTag => options.temp_tag,
            _ => true,
        }
    }

    /// The stages a run with `options` goes through
    pub fn plan(options: &PublishOptions) -> Vec<Stage> {
        Self::ALL.into_iter().filter(|s| s.enabled(options)).collect()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan() {
        let options = PublishOptions {
            git_reset: true,
            ..Default::default()
        };
        let plan = Stage::plan(&options);
        assert!(!plan.contains(&Stage::PromoteTempTag));
        assert_eq!(plan.first(), Some(&Stage::Preflight));
        assert_eq!(plan.last(), Some(&Stage::ResetWorkingTree));
    }

    #[test]
    fn test_canary_temp_tag_plan() {
        let options = PublishOptions {
            canary: true,
            temp_tag: true,
            git_reset: false,
            ..Default::default()
        };
        let plan = Stage::plan(&options);
        let pack = plan.iter().position(|s| *s == Stage::Pack).unwrap();
        let versions = plan.iter().position(|s| *s == Stage::ApplyVersions).unwrap();
        assert!(versions < pack);
        assert_eq!(plan.last(), Some(&Stage::PromoteTempTag));
        assert!(!plan.contains(&Stage::ResetWorkingTree));
    }
}
