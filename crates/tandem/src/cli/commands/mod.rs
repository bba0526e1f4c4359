//! CLI commands

mod ls;
mod publish;

pub use ls::LsCommand;
pub use publish::PublishCommand;
