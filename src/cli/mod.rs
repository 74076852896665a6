//! Command-line interface for tfroot.
//!
//! # Available Commands
//!
//! - `list` - find every initialized root module in a workspace and load it
//! - `inspect` - load a single root module and report its version and schemas
//! - `candidates` - show which root module(s) a configuration file belongs to
//!
//! # Global Options
//!
//! - `--verbose` - debug logging on stderr
//! - `--quiet` - errors only
//! - `--config` - settings file, see [`crate::config`]
//!
//! ```bash
//! tfroot list ~/src/infra
//! tfroot inspect envs/prod --resource aws_instance
//! tfroot --verbose candidates modules/vpc/main.tf
//! ```

mod candidates;
mod common;
mod inspect;
mod list;

pub use candidates::CandidatesCommand;
pub use common::ModuleSummary;
pub use inspect::InspectCommand;
pub use list::ListCommand;

use crate::config::Settings;
use crate::logging::init_logging;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Terraform root module inspector.
#[derive(Parser, Debug)]
#[command(
    name = "tfroot",
    about = "Discover terraform root modules and their provider schemas",
    version,
    long_about = "tfroot finds directories initialized with `terraform init`, loads their module manifests \
                  and provider schemas through the terraform CLI, and reports what it found."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Settings file to use instead of the default location
    #[arg(short, long, global = true, env = "TFROOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List root modules in a workspace
    List(ListCommand),

    /// Load and describe one root module
    Inspect(InspectCommand),

    /// Show the root modules a file belongs to
    Candidates(CandidatesCommand),
}

impl Cli {
    /// Log filter implied by `--verbose` / `--quiet`.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }

    pub async fn execute(self) -> Result<()> {
        init_logging(self.log_filter());
        let settings = Settings::load(self.config.as_deref()).await?;
        tracing::debug!(target: "cli", "Using settings {:?}", settings);

        match self.command {
            Commands::List(cmd) => cmd.execute(settings).await,
            Commands::Inspect(cmd) => cmd.execute(settings).await,
            Commands::Candidates(cmd) => cmd.execute(settings).await,
        }
    }
}
