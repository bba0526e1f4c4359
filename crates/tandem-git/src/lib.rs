//! tandem git - Git operations for release management
//!
//! This crate provides the repository queries a release needs: describing
//! HEAD against release tags, tags at HEAD, working tree cleanliness,
//! restoring manifests and listing changed files.

mod client;
mod describe;
mod diff;
mod repository;
mod status;
mod tags;

pub use client::Git;
pub use describe::parse_describe;
pub use repository::{GitRepo, Result};
