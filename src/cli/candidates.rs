//! `tfroot candidates`: which root module does a file belong to?

use super::common::{build_manager, interrupt_token};
use crate::config::Settings;
use crate::manager::{candidates_message, render_candidate_path};
use anyhow::{Context, Result, anyhow};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct CandidatesCommand {
    /// Configuration file to look up
    file: PathBuf,

    /// Workspace to search; defaults to the current directory
    #[arg(short, long)]
    workspace: Option<PathBuf>,
}

impl CandidatesCommand {
    pub async fn execute(self, settings: Settings) -> Result<()> {
        let file = self
            .file
            .canonicalize()
            .with_context(|| format!("File {} does not exist", self.file.display()))?;
        let file_dir = file.parent().ok_or_else(|| anyhow!("{} has no parent directory", file.display()))?;
        let file_name = file.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();

        let workspace = match self.workspace {
            Some(dir) => dir,
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let workspace = workspace
            .canonicalize()
            .with_context(|| format!("Workspace {} does not exist", workspace.display()))?;

        let manager = build_manager(settings);
        manager.load_workspace(&workspace, &interrupt_token()).await?;

        let candidates: Vec<PathBuf> = manager
            .root_module_candidates_by_path(file_dir)
            .iter()
            .map(|m| m.path().to_path_buf())
            .collect();

        match candidates_message(&workspace, &file_name, &candidates) {
            Some(message) if candidates.is_empty() => println!("{} {message}", "warning:".yellow()),
            Some(message) => println!("{} {message}", "note:".cyan()),
            None => {}
        }
        for candidate in &candidates {
            println!("{}", render_candidate_path(&workspace, candidate));
        }
        Ok(())
    }
}
