//! CLI definition and command handling

pub mod commands;
pub mod output;
pub mod prompt;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use tandem_core::config::{config_root, load_config_or_default, Config};

use commands::{LsCommand, PublishCommand};

/// Tandem - dependency-ordered publishing for JavaScript monorepos
#[derive(Debug, Parser)]
#[command(name = "tandem")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Publish packages in dependency order
    Publish(PublishCommand),

    /// List packages in dependency order
    Ls(LsCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        // Change to specified directory if provided
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        match self.command {
            Commands::Publish(ref cmd) => cmd.execute(&self),
            Commands::Ls(ref cmd) => cmd.execute(&self),
        }
    }

    /// Whether human-readable output should be printed
    pub fn prints_text(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Text
    }
}

/// Configuration for the current directory and the monorepo root it names
pub fn load_workspace() -> anyhow::Result<(Config, PathBuf)> {
    let cwd = std::env::current_dir()?;
    let (config, config_path) = load_config_or_default(&cwd)?;
    let root = config_path.as_deref().map(config_root).unwrap_or(cwd);
    Ok((config, root))
}
