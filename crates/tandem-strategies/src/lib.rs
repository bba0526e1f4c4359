//! Tandem version resolution strategies
//!
//! Each strategy decides which packages of a monorepo are released and at
//! which version:
//!
//! - `from-git`: packages tagged on the HEAD commit
//! - `from-package`: manifest versions missing from the registry
//! - `canary`: synthetic prereleases derived from commit distance
//! - `explicit-bump`: versions decided by the caller

pub mod canary;
pub mod explicit;
pub mod from_git;
pub mod from_package;
pub mod increment;
pub mod traits;
pub mod working_tree;

#[cfg(test)]
mod testing;

pub use canary::{canary_version, Canary};
pub use explicit::Explicit;
pub use from_git::FromGit;
pub use from_package::FromPackage;
pub use increment::increment;
pub use traits::{ResolveContext, ResolveOutcome, VersionResolver};
pub use working_tree::{require_clean, require_clean_if_repository};
