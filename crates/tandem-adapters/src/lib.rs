//! Tandem Adapters - npm registry and packing
//!
//! Everything that talks to the outside world on behalf of the release
//! pipeline goes through the `npm` CLI, driven with `tokio::process`.

pub mod command;
pub mod credentials;
pub mod packer;
pub mod registry;

pub use command::NpmCommand;
pub use credentials::{nerf_dart, normalize_registry, Credential, CredentialProvider};
pub use packer::NpmPacker;
pub use registry::NpmRegistry;
