//! tandem core - shared model for dependency-ordered monorepo publishing
//!
//! This crate provides the error taxonomy, configuration, lifecycle hooks,
//! the package graph with its local link resolver, and the collaborator
//! traits the release pipeline is written against.

pub mod config;
pub mod error;
pub mod hooks;
pub mod monorepo;
pub mod traits;
pub mod types;

pub use config::Config;
pub use error::{
    ConfigError, CycleError, GitError, HookError, PackError, PackageFailure, PartialPublishError,
    RegistryError, Result, TandemError, ValidationError, WorkingTreeError,
};
pub use hooks::{Hook, HookContext, HookRunner, HookStage};
pub use monorepo::{DependencyGraph, PackageNode, ReleaseSet};
pub use traits::{
    AutoConfirm, Confirmer, DescribeResult, GitClient, OtpPrompter, PackRequest, Packer,
    PublishRequest, RegistryClient,
};
pub use types::{GraphType, PublishedPackage, ReleaseType};
