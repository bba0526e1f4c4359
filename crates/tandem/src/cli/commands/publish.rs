//! Publish command

use std::sync::Arc;

use clap::Args;
use console::style;
use tracing::info;

use tandem_adapters::{Credential, CredentialProvider, NpmCommand, NpmPacker, NpmRegistry};
use tandem_core::config::Config;
use tandem_core::error::{PartialPublishError, TandemError};
use tandem_core::hooks::HookRunner;
use tandem_core::monorepo::load_graph;
use tandem_core::traits::{AutoConfirm, Confirmer};
use tandem_core::types::{GraphType, ReleaseType};
use tandem_git::Git;
use tandem_publish::{AbortReason, Collaborators, PublishOptions, PublishOutcome, PublishPipeline, VersionSource};
use tandem_tasks::TaskReporterRegistry;

use crate::cli::output::{self, ProgressReporter};
use crate::cli::prompt::{TerminalConfirmer, TerminalOtpPrompter};
use crate::cli::{load_workspace, Cli, OutputFormat};

/// Publish packages in dependency order
#[derive(Debug, Args)]
pub struct PublishCommand {
    /// Where release versions come from: from-git or from-package
    pub source: Option<VersionSource>,

    /// Publish prerelease versions derived from the current commit
    #[arg(long)]
    pub canary: bool,

    /// Prerelease identifier for canary versions
    #[arg(long)]
    pub preid: Option<String>,

    /// Increment applied to canary versions
    #[arg(long, requires = "canary")]
    pub bump: Option<ReleaseType>,

    /// Treat every package as changed (canary)
    #[arg(long)]
    pub force_publish: bool,

    /// Consider tags reachable through merged branches
    #[arg(long)]
    pub include_merged_tags: bool,

    /// Dist tag to publish under
    #[arg(long)]
    pub dist_tag: Option<String>,

    /// Dist tag for prerelease versions
    #[arg(long)]
    pub pre_dist_tag: Option<String>,

    /// Publish under a temporary dist tag, then promote once all succeeded
    #[arg(long)]
    pub temp_tag: bool,

    /// Registry to publish to
    #[arg(long)]
    pub registry: Option<String>,

    /// Registry token
    #[arg(long, env = "NPM_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// One-time password for two-factor authentication
    #[arg(long, env = "TANDEM_OTP", hide_env_values = true)]
    pub otp: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Pin local dependencies without the ^ prefix
    #[arg(long)]
    pub exact: bool,

    /// Commit recorded as gitHead (from-package only)
    #[arg(long)]
    pub git_head: Option<String>,

    /// Keep manifest changes made for publishing
    #[arg(long)]
    pub no_git_reset: bool,

    /// Skip the logged-in user and package access checks
    #[arg(long)]
    pub no_verify_access: bool,

    /// Subdirectory of each package to publish
    #[arg(long)]
    pub contents: Option<String>,

    /// Packages processed at the same time
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Fail when released packages depend on each other in a cycle
    #[arg(long)]
    pub reject_cycles: bool,

    /// Skip npm lifecycle scripts while packing
    #[arg(long)]
    pub ignore_scripts: bool,

    /// Dependency fields that order the run: dependencies or all
    #[arg(long)]
    pub graph_type: Option<GraphType>,
}

impl PublishCommand {
    /// Execute the publish command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(
            source = ?self.source,
            canary = self.canary,
            dist_tag = ?self.dist_tag,
            temp_tag = self.temp_tag,
            "executing publish command"
        );
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let (mut config, root) = load_workspace()?;
        self.override_config(&mut config);
        let options = self.options(&config)?;
        options.validate()?;

        let graph = load_graph(&root, &config)?;
        let registry_url = options.effective_registry();
        let credential = self
            .token
            .clone()
            .map(Credential::Token)
            .or_else(|| CredentialProvider::new().with_project_dir(&root).get(&registry_url));
        let npm = NpmCommand::locate(&registry_url)
            .map_err(TandemError::from)?
            .with_credential(credential);

        let confirmer: Arc<dyn Confirmer> = if options.yes {
            Arc::new(AutoConfirm)
        } else {
            Arc::new(TerminalConfirmer)
        };
        let collaborators = Collaborators {
            git: Arc::new(Git::new(&root)),
            registry: Arc::new(NpmRegistry::new(npm.clone())),
            packer: Arc::new(NpmPacker::new(npm)),
            prompter: Arc::new(TerminalOtpPrompter),
            confirmer,
        };

        let mut reporter = TaskReporterRegistry::new();
        if cli.prints_text() {
            reporter.register(Arc::new(ProgressReporter::new()));
        }

        let pipeline = PublishPipeline::new(&root, options, collaborators)
            .with_hooks(HookRunner::from_config(&config.hooks, &root))
            .with_reporter(Arc::new(reporter));

        match pipeline.run(graph).await {
            Ok(outcome) => {
                report_outcome(cli, &outcome)?;
                Ok(())
            }
            Err(TandemError::PartialPublish(partial)) => {
                if !cli.quiet {
                    report_partial(&partial);
                }
                Err(TandemError::PartialPublish(partial).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Configuration values with command line overrides applied
    fn options(&self, config: &Config) -> anyhow::Result<PublishOptions> {
        let mut options = PublishOptions::from_config(config)?;
        options.source = self.source;
        options.canary = self.canary;
        if let Some(preid) = &self.preid {
            options.preid = preid.clone();
        }
        if let Some(bump) = self.bump {
            options.canary_bump = bump;
        }
        options.force_publish = self.force_publish;
        options.include_merged_tags |= self.include_merged_tags;
        if self.dist_tag.is_some() {
            options.dist_tag = self.dist_tag.clone();
        }
        if self.pre_dist_tag.is_some() {
            options.pre_dist_tag = self.pre_dist_tag.clone();
        }
        options.temp_tag |= self.temp_tag;
        if self.registry.is_some() {
            options.registry = self.registry.clone();
        }
        options.otp = self.otp.clone();
        options.yes = self.yes;
        options.exact |= self.exact;
        options.git_head = self.git_head.clone();
        if self.no_git_reset {
            options.git_reset = false;
        }
        if self.no_verify_access {
            options.verify_access = false;
        }
        if self.contents.is_some() {
            options.contents = self.contents.clone();
        }
        if self.concurrency.is_some() {
            options.concurrency = self.concurrency;
        }
        options.reject_cycles |= self.reject_cycles;
        options.ignore_scripts |= self.ignore_scripts;
        Ok(options)
    }

    /// Flags that change how the workspace itself is loaded
    fn override_config(&self, config: &mut Config) {
        if let Some(graph_type) = self.graph_type {
            config.publish.graph_type = graph_type;
        }
    }
}

fn report_outcome(cli: &Cli, outcome: &PublishOutcome) -> anyhow::Result<()> {
    if cli.format == OutputFormat::Json {
        let published: Vec<serde_json::Value> = outcome
            .published()
            .iter()
            .map(|p| serde_json::json!({ "name": p.name, "version": p.version }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&published)?);
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    match outcome {
        PublishOutcome::Aborted(AbortReason::NoCandidates) => {
            output::info("No changed packages to publish");
        }
        PublishOutcome::Aborted(AbortReason::Declined) => {
            println!("{}", style("Aborted.").yellow());
        }
        PublishOutcome::Published(_) => {
            if let Some(summary) = outcome.summary() {
                output::success(&summary);
            }
        }
    }
    Ok(())
}

fn report_partial(partial: &PartialPublishError) {
    output::warning(&format!("{} did not complete", partial.stage));
    if !partial.succeeded.is_empty() {
        println!("{}", output::header("Completed:"));
        for name in &partial.succeeded {
            println!(" - {}", name);
        }
    }
    println!("{}", output::header("Failed:"));
    for failure in &partial.failed {
        println!(" - {}: {}", failure.package, failure.message);
    }
    if !partial.skipped.is_empty() {
        println!("{}", output::header("Not attempted:"));
        for name in &partial.skipped {
            println!(" - {}", name);
        }
    }
}
