//! Publish options: configuration merged with command line overrides

use semver::Version;
use tracing::warn;

use tandem_core::config::{Config, NPM_REGISTRY, YARN_REGISTRY};
use tandem_core::error::{Result, ValidationError};
use tandem_core::types::ReleaseType;
use tandem_strategies::{Canary, FromGit, FromPackage, VersionResolver};

/// Where release versions come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    /// Tags on the HEAD commit
    FromGit,
    /// Manifest versions not yet on the registry
    FromPackage,
}

impl VersionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FromGit => "from-git",
            Self::FromPackage => "from-package",
        }
    }
}

impl std::str::FromStr for VersionSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "from-git" => Ok(Self::FromGit),
            "from-package" => Ok(Self::FromPackage),
            other => Err(ValidationError::InvalidBump(other.to_string())),
        }
    }
}

/// Everything that steers one publish run
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// `from-git` / `from-package`
    pub source: Option<VersionSource>,
    /// Publish synthetic prerelease versions
    pub canary: bool,
    /// Canary prerelease identifier
    pub preid: String,
    /// Canary increment
    pub canary_bump: ReleaseType,
    /// Consider tags reachable through merge parents
    pub include_merged_tags: bool,
    /// Treat every package as changed (canary)
    pub force_publish: bool,
    /// Per-package versioning
    pub independent: bool,
    /// Fixed project version from configuration
    pub fixed_version: Option<Version>,
    /// Prefix of fixed-mode tags
    pub tag_version_prefix: String,
    /// Explicit dist tag
    pub dist_tag: Option<String>,
    /// Dist tag for prerelease versions
    pub pre_dist_tag: Option<String>,
    /// Publish under the temporary tag, then promote
    pub temp_tag: bool,
    /// Registry URL as configured
    pub registry: Option<String>,
    /// Pre-seeded one-time password
    pub otp: Option<String>,
    /// Skip confirmation
    pub yes: bool,
    /// Drop the `^` save prefix when rewriting links
    pub exact: bool,
    /// Commit to record as `gitHead` instead of HEAD
    pub git_head: Option<String>,
    /// Restore manifests after publishing
    pub git_reset: bool,
    /// Check credentials and permissions first
    pub verify_access: bool,
    /// Subdirectory to publish instead of each package root
    pub contents: Option<String>,
    /// Worker pool size
    pub concurrency: Option<usize>,
    /// Fail on dependency cycles
    pub reject_cycles: bool,
    /// Skip npm lifecycle scripts while packing
    pub ignore_scripts: bool,
    /// Dependency names whose specifiers are never rewritten
    pub preserve_links: Vec<String>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self::assemble(&Config::default(), None)
    }
}

impl PublishOptions {
    /// Options with every value taken from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let fixed_version = config
            .fixed_version()
            .map(|v| {
                Version::parse(v).map_err(|e| ValidationError::InvalidVersion {
                    package: "<project>".to_string(),
                    version: v.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;
        Ok(Self::assemble(config, fixed_version))
    }

    fn assemble(config: &Config, fixed_version: Option<Version>) -> Self {
        let publish = &config.publish;
        Self {
            source: None,
            canary: false,
            preid: config.canary.preid.clone(),
            canary_bump: config.canary.bump,
            include_merged_tags: config.canary.include_merged_tags,
            force_publish: false,
            independent: config.is_independent(),
            fixed_version,
            tag_version_prefix: publish.tag_version_prefix.clone(),
            dist_tag: publish.dist_tag.clone(),
            pre_dist_tag: publish.pre_dist_tag.clone(),
            temp_tag: publish.temp_tag,
            registry: publish.registry.clone(),
            otp: None,
            yes: false,
            exact: publish.exact,
            git_head: None,
            git_reset: publish.git_reset,
            verify_access: publish.verify_access,
            contents: publish.contents.clone(),
            concurrency: publish.concurrency,
            reject_cycles: publish.reject_cycles,
            ignore_scripts: publish.ignore_scripts,
            preserve_links: publish.local_links.preserve.clone(),
        }
    }

    /// Reject flag combinations that cannot work together
    pub fn validate(&self) -> Result<()> {
        if self.canary {
            if let Some(source) = self.source {
                return Err(ValidationError::ConflictingOptions {
                    first: "--canary".to_string(),
                    second: source.as_str().to_string(),
                }
                .into());
            }
        }
        if self.git_head.is_some() && self.source != Some(VersionSource::FromPackage) {
            return Err(ValidationError::Invalid(
                "--git-head is only allowed with \"from-package\"".to_string(),
            )
            .into());
        }
        if self.concurrency == Some(0) {
            return Err(ValidationError::Invalid("concurrency must be at least 1".to_string()).into());
        }
        for tag in [&self.dist_tag, &self.pre_dist_tag].into_iter().flatten() {
            if tag.trim().is_empty() {
                return Err(ValidationError::Invalid("dist tags cannot be empty".to_string()).into());
            }
        }
        Ok(())
    }

    /// The resolver these options select, if any
    pub fn resolver(&self) -> Option<Box<dyn VersionResolver>> {
        if self.canary {
            return Some(Box::new(
                Canary::new(self.independent, self.tag_version_prefix.clone())
                    .with_preid(self.preid.clone())
                    .with_bump(self.canary_bump)
                    .with_include_merged_tags(self.include_merged_tags)
                    .with_force_publish(self.force_publish)
                    .with_fixed_version(self.fixed_version.clone()),
            ));
        }
        match self.source? {
            VersionSource::FromGit => Some(Box::new(FromGit::new(
                self.independent,
                self.tag_version_prefix.clone(),
            ))),
            VersionSource::FromPackage => Some(Box::new(FromPackage)),
        }
    }

    /// Registry URL to talk to.
    ///
    /// Yarn's proxy does not accept publishes, so it is swapped for the
    /// public npm registry.
    pub fn effective_registry(&self) -> String {
        match self.registry.as_deref().map(str::trim) {
            None | Some("") => NPM_REGISTRY.to_string(),
            Some(url) if url.trim_end_matches('/') == YARN_REGISTRY => {
                warn!("Yarn's registry proxy is broken, replacing with public npm registry");
                warn!("If you don't have an npm token, you should exit and run \"npm login\"");
                NPM_REGISTRY.to_string()
            }
            Some(url) => url.to_string(),
        }
    }

    /// Dist tag used when nothing more specific applies
    pub fn base_dist_tag(&self) -> Option<String> {
        if let Some(tag) = &self.dist_tag {
            return Some(tag.trim().to_string());
        }
        if self.canary {
            return Some("canary".to_string());
        }
        None
    }
}
