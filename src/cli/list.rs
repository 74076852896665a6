//! `tfroot list`: find and load every root module in a workspace.

use super::common::{ModuleSummary, build_manager, interrupt_token, validate_format};
use crate::config::Settings;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ListCommand {
    /// Workspace to search; defaults to the current directory
    workspace: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short = 'f', long, default_value = "table")]
    format: String,

    /// Also show the local modules each root module calls
    #[arg(long)]
    detailed: bool,
}

impl ListCommand {
    pub async fn execute(self, settings: Settings) -> Result<()> {
        validate_format(&self.format)?;
        let workspace = match self.workspace {
            Some(dir) => dir,
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let workspace = workspace
            .canonicalize()
            .with_context(|| format!("Workspace {} does not exist", workspace.display()))?;

        let manager = build_manager(settings);
        let cancel = interrupt_token();
        let modules = manager.load_workspace(&workspace, &cancel).await?;

        let mut summaries = Vec::with_capacity(modules.len());
        for module in &modules {
            summaries.push(ModuleSummary::collect(module, &workspace).await);
        }

        if self.format == "json" {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
            return Ok(());
        }

        if summaries.is_empty() {
            println!(
                "No root modules found in {}. Run {} in a module directory first.",
                workspace.display(),
                "terraform init".bold()
            );
            return Ok(());
        }
        for summary in &summaries {
            println!("{}", summary.render(self.detailed));
        }
        Ok(())
    }
}
