//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{GraphType, ReleaseType};

use super::defaults::{DEFAULT_CANARY_PREID, DEFAULT_PACKAGE_GLOB, DEFAULT_TAG_VERSION_PREFIX};

/// Marker value of `version` that selects per-package versioning
pub const INDEPENDENT: &str = "independent";

/// Main configuration for tandem
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fixed project version, or `"independent"`
    pub version: Option<String>,

    /// Package directory globs relative to the root
    pub packages: Vec<String>,

    /// Publishing configuration
    pub publish: PublishConfig,

    /// Canary release configuration
    pub canary: CanaryConfig,

    /// Lifecycle hooks
    pub hooks: HooksConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: None,
            packages: vec![DEFAULT_PACKAGE_GLOB.to_string()],
            publish: PublishConfig::default(),
            canary: CanaryConfig::default(),
            hooks: HooksConfig::default(),
        }
    }
}

impl Config {
    /// Whether packages are versioned independently
    pub fn is_independent(&self) -> bool {
        self.version.as_deref() == Some(INDEPENDENT)
    }

    /// The fixed project version, if one is set
    pub fn fixed_version(&self) -> Option<&str> {
        self.version.as_deref().filter(|v| *v != INDEPENDENT)
    }
}

/// Publishing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Registry URL; the npm default when unset
    pub registry: Option<String>,

    /// Dist tag applied to published versions
    pub dist_tag: Option<String>,

    /// Dist tag applied to prerelease versions
    pub pre_dist_tag: Option<String>,

    /// Publish under a temporary tag and promote afterwards
    pub temp_tag: bool,

    /// Rewrite local links without a range operator
    pub exact: bool,

    /// Prefix of fixed-mode release tags
    pub tag_version_prefix: String,

    /// Restore manifests to their committed state after publishing
    pub git_reset: bool,

    /// Check registry login and package permissions before publishing
    pub verify_access: bool,

    /// Maximum packages processed at once; CPU count when unset
    pub concurrency: Option<usize>,

    /// Fail instead of warning when the graph has a cycle
    pub reject_cycles: bool,

    /// Which dependency fields create ordering edges
    pub graph_type: GraphType,

    /// Subdirectory of each package to publish
    pub contents: Option<String>,

    /// Skip npm lifecycle scripts while packing
    pub ignore_scripts: bool,

    /// Local link rewriting rules
    pub local_links: LocalLinksConfig,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            registry: None,
            dist_tag: None,
            pre_dist_tag: None,
            temp_tag: false,
            exact: false,
            tag_version_prefix: DEFAULT_TAG_VERSION_PREFIX.to_string(),
            git_reset: true,
            verify_access: true,
            concurrency: None,
            reject_cycles: false,
            graph_type: GraphType::default(),
            contents: None,
            ignore_scripts: false,
            local_links: LocalLinksConfig::default(),
        }
    }
}

/// Local link rewriting rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalLinksConfig {
    /// Dependency name globs whose specifiers are never rewritten
    pub preserve: Vec<String>,
}

/// Canary release configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanaryConfig {
    /// Prerelease identifier
    pub preid: String,

    /// Increment applied before the prerelease suffix
    pub bump: ReleaseType,

    /// Consider tags reachable only through merge parents
    pub include_merged_tags: bool,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            preid: DEFAULT_CANARY_PREID.to_string(),
            bump: ReleaseType::Patch,
            include_merged_tags: false,
        }
    }
}

/// Hook configuration, keyed by stage name (`pre-pack`, `post-publish`, ...)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HooksConfig {
    /// Commands per stage
    pub stages: HashMap<String, Vec<HookEntry>>,
}

/// A hook either as a bare command string or a table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HookEntry {
    /// Just the command
    Command(String),
    /// Full form
    Detailed {
        /// Command to run
        command: String,
        /// Fail the release when the command fails
        #[serde(default = "default_true")]
        fail_on_error: bool,
        /// Timeout in seconds
        #[serde(default)]
        timeout: Option<u64>,
    },
}

fn default_true() -> bool {
    true
}
