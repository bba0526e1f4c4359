//! Error types for tandem

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using TandemError
pub type Result<T> = std::result::Result<T, TandemError>;

/// Main error type for tandem operations
#[derive(Debug, Error)]
pub enum TandemError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Git-related errors
    #[error(transparent)]
    Git(#[from] GitError),

    /// Pre-flight validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Working tree state errors
    #[error(transparent)]
    WorkingTree(#[from] WorkingTreeError),

    /// Dependency cycle rejected by policy
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// Some packages failed after others succeeded
    #[error(transparent)]
    PartialPublish(#[from] PartialPublishError),

    /// Registry errors
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Packing errors
    #[error(transparent)]
    Pack(#[from] PackError),

    /// Hook errors
    #[error(transparent)]
    Hook(#[from] HookError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Semver parsing error
    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),

    /// Interactive prompt errors
    #[error("Prompt failed: {0}")]
    Prompt(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl TandemError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Whether this error means git itself is unusable (no repository)
    pub fn is_not_a_repository(&self) -> bool {
        matches!(self, Self::Git(GitError::NotARepository(_)))
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Git-related errors
#[derive(Debug, Error)]
pub enum GitError {
    /// Not a git repository, or git is otherwise unusable here
    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    /// No commits found
    #[error("No commits found in repository")]
    NoCommits,

    /// Working directory is not clean
    #[error("Working directory has uncommitted changes")]
    DirtyWorkingDirectory,

    /// Reference could not be resolved
    #[error("Unknown git reference: {0}")]
    UnknownReference(String),

    /// Git2 library error
    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),
}

/// Validation failures detected before any side effect
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Two flags or options that cannot be combined
    #[error("Option {first} cannot be combined with {second}")]
    ConflictingOptions { first: String, second: String },

    /// A non-private package has no version field
    #[error("Package {0} is missing a version field")]
    MissingVersion(String),

    /// A manifest version that is not valid semver
    #[error("Package {package} has an invalid version '{version}': {reason}")]
    InvalidVersion {
        package: String,
        version: String,
        reason: String,
    },

    /// Two manifests declare the same package name
    #[error("Package name {0} is declared more than once")]
    DuplicatePackage(String),

    /// The package is not part of the workspace
    #[error("Unknown package: {0}")]
    UnknownPackage(String),

    /// A bump keyword that is not recognised
    #[error("Invalid bump type: {0}")]
    InvalidBump(String),

    /// Logged-in user cannot write to a package
    #[error("You do not have write permission required to publish {0}")]
    AccessDenied(String),

    /// Registry reports no authenticated user
    #[error("Authentication error: not logged in to {0}")]
    NotAuthenticated(String),

    /// Anything else
    #[error("{0}")]
    Invalid(String),
}

/// Working tree errors
#[derive(Debug, Error)]
pub enum WorkingTreeError {
    /// Uncommitted changes present
    #[error("Working tree has uncommitted changes, please commit or remove them first")]
    UncommittedChanges,

    /// HEAD is detached where a branch is required
    #[error("HEAD is detached, check out a branch first")]
    Detached,
}

/// Dependency cycle among the selected packages
#[derive(Debug, Error)]
#[error("Dependency cycle detected: {}", .members.join(" -> "))]
pub struct CycleError {
    /// Packages that remain in the cycle, in declaration order
    pub members: Vec<String>,
}

/// Per-package failure inside a partial publish
#[derive(Debug, Clone)]
pub struct PackageFailure {
    /// Package name
    pub package: String,
    /// Rendered error message
    pub message: String,
}

/// Pack or publish failed for some packages after others completed
#[derive(Debug, Error)]
#[error(
    "{stage} failed for {}; completed: {}",
    render_failures(.failed),
    render_names(.succeeded)
)]
pub struct PartialPublishError {
    /// Stage the failure happened in ("pack", "publish", ...)
    pub stage: String,
    /// Packages whose operation completed
    pub succeeded: Vec<String>,
    /// Packages whose operation failed
    pub failed: Vec<PackageFailure>,
    /// Packages never started because of the failure
    pub skipped: Vec<String>,
}

fn render_failures(failed: &[PackageFailure]) -> String {
    failed
        .iter()
        .map(|f| format!("{} ({})", f.package, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_names(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

/// Registry collaborator errors
#[derive(Debug, Error, Clone)]
pub enum RegistryError {
    /// The registry demands a one-time password (missing or expired)
    #[error("One-time password required")]
    OtpRequired,

    /// Authentication failed
    #[error("Authentication failed for registry {registry}: {reason}")]
    AuthenticationFailed { registry: String, reason: String },

    /// The package or version does not exist
    #[error("Not found in registry: {0}")]
    NotFound(String),

    /// Command execution failed
    #[error("Command failed: {command} - {reason}")]
    CommandFailed { command: String, reason: String },

    /// Response could not be understood
    #[error("Unexpected registry response: {0}")]
    InvalidResponse(String),
}

/// Packaging collaborator errors
#[derive(Debug, Error)]
pub enum PackError {
    /// Packing command failed
    #[error("Failed to pack {package}: {reason}")]
    Failed { package: String, reason: String },

    /// Pack output could not be parsed
    #[error("Unexpected pack output for {package}: {reason}")]
    InvalidOutput { package: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Hook execution errors
#[derive(Debug, Error)]
pub enum HookError {
    /// Hook execution failed
    #[error("Hook '{stage}' failed: {command} - {message}")]
    ExecutionFailed {
        stage: String,
        command: String,
        message: String,
    },

    /// Hook timed out
    #[error("Hook '{stage}' timed out after {timeout_secs}s: {command}")]
    Timeout {
        stage: String,
        command: String,
        timeout_secs: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_names_members() {
        let err = CycleError {
            members: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(err.to_string(), "Dependency cycle detected: a -> b -> c");
    }

    #[test]
    fn test_partial_publish_lists_both_sides() {
        let err = PartialPublishError {
            stage: "publish".to_string(),
            succeeded: vec!["a".into()],
            failed: vec![PackageFailure {
                package: "b".into(),
                message: "boom".into(),
            }],
            skipped: vec!["c".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("b (boom)"));
        assert!(msg.contains("completed: a"));
    }

    #[test]
    fn test_not_a_repository_kind() {
        let err: TandemError = GitError::NotARepository(PathBuf::from("/tmp")).into();
        assert!(err.is_not_a_repository());
        let err: TandemError = GitError::DirtyWorkingDirectory.into();
        assert!(!err.is_not_a_repository());
    }
}
