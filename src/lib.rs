//! tfroot - terraform root module orchestration
//!
//! A root module is a directory in which `terraform init` has been run. tfroot
//! discovers such directories, reads the caches terraform left behind (module
//! manifest, plugin lock file), locates a terraform binary, and loads the provider
//! schemas needed to understand the configuration in each module.
//!
//! # Architecture Overview
//!
//! - [`rootmodule::RootModule`] owns the per-directory state and runs the staged load
//!   pipeline (manifest, executor, version, schema storage, parser, schemas). Stage
//!   failures are collected rather than aborting the pipeline.
//! - [`schema::SchemaStorage`] caches the provider schema document and hands it out to
//!   readers without ever blocking them behind a refresh.
//! - [`manager::RootModuleManager`] keeps the root modules of a workspace and maps
//!   files to the root modules they belong to.
//!
//! # Core Modules
//!
//! - [`cli`] - Command-line interface (`list`, `inspect`, `candidates`)
//! - [`config`] - User settings (`~/.config/tfroot/config.toml`)
//! - [`core`] - Error types and user-facing error rendering
//! - [`exec`] - Terraform executor contract and the CLI-backed implementation
//! - [`lang`] - Version-specific configuration parsers
//! - [`logging`] - Injectable logger handles
//! - [`manager`] - Workspace-wide root module management
//! - [`rootmodule`] - The root module orchestrator
//! - [`schema`] - Provider schema model, naming schemes and cache
//!
//! ## Supporting Modules
//!
//! - [`constants`] - Version thresholds, file names, defaults
//! - [`utils`] - Path normalization and comparison
//! - [`version`] - Lenient version parsing
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tfroot::rootmodule::{RootModule, RootModuleOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let module = Arc::new(RootModule::new("/src/infra/prod", RootModuleOptions::default()));
//! module.discover_caches().await?;
//! if let Err(errors) = module.load(&CancellationToken::new()).await {
//!     eprintln!("{errors}");
//! }
//! let parser = module.parser().await?;
//! println!("{}", parser.describe_block("resource", "aws_instance")?);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod exec;
pub mod lang;
pub mod logging;
pub mod manager;
pub mod rootmodule;
pub mod schema;
pub mod utils;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
