//! List command

use clap::Args;
use console::style;
use tracing::info;

use tandem_core::monorepo::{load_graph, DependencyGraph};

use crate::cli::output::{header, package_style, version_style};
use crate::cli::{load_workspace, Cli, OutputFormat};

/// List packages in dependency order
#[derive(Debug, Args)]
pub struct LsCommand {
    /// Include private packages
    #[arg(short, long)]
    pub all: bool,
}

impl LsCommand {
    /// Execute the ls command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let (config, root) = load_workspace()?;
        info!(root = %root.display(), "listing packages");
        let graph = load_graph(&root, &config)?;
        let rows = self.rows(&graph);

        match cli.format {
            OutputFormat::Json => {
                let json: Vec<serde_json::Value> = rows
                    .iter()
                    .map(|row| {
                        serde_json::json!({
                            "name": row.name,
                            "version": row.version,
                            "private": row.private,
                            "location": row.location,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            OutputFormat::Text => {
                if !cli.quiet {
                    println!("{}", header(&format!("{} packages", rows.len())));
                }
                for row in &rows {
                    let private = if row.private {
                        style(" (private)").dim().to_string()
                    } else {
                        String::new()
                    };
                    println!(
                        "{} {}{}",
                        package_style().apply_to(&row.name),
                        version_style().apply_to(row.version.as_deref().unwrap_or("-")),
                        private
                    );
                }
            }
        }

        Ok(())
    }

    fn rows(&self, graph: &DependencyGraph) -> Vec<Row> {
        graph
            .topological_order()
            .into_iter()
            .filter_map(|name| graph.get(&name))
            .filter(|node| self.all || !node.is_private())
            .map(|node| Row {
                name: node.name().to_string(),
                version: node.version().map(|v| v.to_string()),
                private: node.is_private(),
                location: node.location().display().to_string(),
            })
            .collect()
    }
}

struct Row {
    name: String,
    version: Option<String>,
    private: bool,
    location: String,
}
