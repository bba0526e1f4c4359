//! Collaborator interfaces the release pipeline drives
//!
//! Git, the registry, packing and interactive prompts are all reached
//! through these traits so the pipeline can run against in-memory fakes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semver::Version;

use crate::error::{GitError, PackError, RegistryError, Result};
use crate::monorepo::PackedArtifact;

type StdResult<T, E> = std::result::Result<T, E>;

/// Outcome of describing HEAD against the nearest matching tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeResult {
    /// Nearest matching tag, if any is reachable
    pub last_tag_name: Option<String>,
    /// Version part of that tag (everything after the last `@`, or the
    /// tag itself in fixed mode)
    pub last_version: Option<String>,
    /// Commits between the tag and HEAD; without a tag, every commit
    /// reachable from HEAD
    pub ref_count: u64,
    /// Abbreviated HEAD commit id
    pub sha: String,
    /// Whether the working tree has uncommitted changes
    pub is_dirty: bool,
}

/// Git plumbing used during a release
pub trait GitClient: Send + Sync {
    /// Repository working directory
    fn root(&self) -> &Path;

    /// Describe HEAD relative to the nearest tag matching a glob
    fn describe_ref(&self, pattern: &str, include_merged_tags: bool) -> StdResult<DescribeResult, GitError>;

    /// Tags pointing at HEAD that match a glob
    fn current_tags(&self, pattern: &str) -> StdResult<Vec<String>, GitError>;

    /// Restore paths to their committed contents
    fn checkout(&self, paths: &[PathBuf]) -> StdResult<(), GitError>;

    /// Full HEAD commit id
    fn current_sha(&self) -> StdResult<String, GitError>;

    /// `Ok` when clean; `DirtyWorkingDirectory` when there are changes,
    /// `NotARepository` when git cannot be used at all
    fn ensure_clean(&self) -> StdResult<(), GitError>;

    /// Files touched by the HEAD commit, relative to the root
    fn files_changed_in_head(&self) -> StdResult<Vec<PathBuf>, GitError>;

    /// Files changed between a reference and HEAD, relative to the root
    fn files_changed_since(&self, reference: &str) -> StdResult<Vec<PathBuf>, GitError>;
}

/// One publish call
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Package name
    pub name: String,
    /// Version in the tarball
    pub version: Version,
    /// Tarball to upload
    pub tarball: PathBuf,
    /// Dist tag to publish under
    pub tag: String,
    /// `publishConfig.access`, if declared
    pub access: Option<String>,
    /// Package directory
    pub location: PathBuf,
}

/// Registry operations
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Registry URL this client talks to
    fn registry_url(&self) -> &str;

    /// Logged-in user; `None` when the registry does not report one
    async fn username(&self) -> StdResult<Option<String>, RegistryError>;

    /// Fail with `AccessDenied` style errors unless `username` can write
    /// every listed package that already exists
    async fn package_access(&self, packages: &[String], username: &str) -> Result<()>;

    /// Whether the account requires a one-time password for writes
    async fn two_factor_required(&self) -> StdResult<bool, RegistryError>;

    /// Whether `name@version` is already on the registry
    async fn is_published(&self, name: &str, version: &Version) -> StdResult<bool, RegistryError>;

    /// Upload a tarball
    async fn publish(&self, request: &PublishRequest, otp: Option<&str>) -> StdResult<(), RegistryError>;

    /// Point `tag` at `spec` (`name@version`)
    async fn add_dist_tag(&self, spec: &str, tag: &str, otp: Option<&str>) -> StdResult<(), RegistryError>;

    /// Remove `tag` from the package named in `spec`
    async fn remove_dist_tag(&self, spec: &str, tag: &str, otp: Option<&str>) -> StdResult<(), RegistryError>;
}

/// One pack call
#[derive(Debug, Clone)]
pub struct PackRequest {
    /// Package name
    pub name: String,
    /// Package directory
    pub location: PathBuf,
    /// Directory whose contents are packed (the package or a subdirectory)
    pub contents: PathBuf,
    /// Where the tarball is written
    pub destination: PathBuf,
    /// Skip lifecycle scripts
    pub ignore_scripts: bool,
}

/// Produces tarballs
#[async_trait]
pub trait Packer: Send + Sync {
    /// Pack one package
    async fn pack(&self, request: &PackRequest) -> StdResult<PackedArtifact, PackError>;
}

/// Asks the operator for a one-time password
#[async_trait]
pub trait OtpPrompter: Send + Sync {
    /// Block until a password is entered
    async fn request_otp(&self, prompt: &str) -> Result<String>;
}

/// Asks the operator to confirm a release
pub trait Confirmer: Send + Sync {
    /// `true` to proceed
    fn confirm(&self, message: &str) -> Result<bool>;
}

/// Confirmer that always agrees, used for `--yes`
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Confirmer for AutoConfirm {
    fn confirm(&self, _message: &str) -> Result<bool> {
        Ok(true)
    }
}
