//! Tandem Publish - dependency-ordered release pipeline
//!
//! Resolves which packages to release, then packs, publishes and tags them
//! in dependency order on top of the topological runner, sharing one
//! one-time password across every registry write of the run.

pub mod context;
pub mod dist_tag;
pub mod license;
pub mod options;
pub mod otp;
pub mod outcome;
pub mod pipeline;
pub mod stages;

#[cfg(test)]
mod testing;

pub use dist_tag::DistTagPlan;
pub use options::{PublishOptions, VersionSource};
pub use otp::{OtpCache, RegistryOp};
pub use outcome::{AbortReason, PublishOutcome};
pub use pipeline::{confirmation_message, Collaborators, PublishPipeline};
pub use stages::Stage;
