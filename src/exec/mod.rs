//! Terraform executor contract and discovery.
//!
//! The root-module orchestrator never spawns processes itself. It talks to an
//! [`Executor`], which it obtains from an [`ExecutorFactory`] once the binary has
//! been located, either from configuration or through a [`DiscoveryFn`].
//!
//! Every call that reaches the external tool takes a [`CancellationToken`]. When the
//! token fires the in-flight process is killed and the call returns
//! [`TfError::Cancelled`](crate::core::TfError::Cancelled).
//!
//! # Modules
//!
//! - [`terraform`] - [`TerraformExecutor`], the implementation backed by the real CLI

pub mod terraform;

pub use terraform::TerraformExecutor;

use crate::constants::TERRAFORM_BINARY;
use crate::core::TfError;
use crate::logging::Logger;
use crate::schema::ProviderSchemas;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The operations the core needs from the terraform CLI.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Directory the tool runs in.
    fn set_workdir(&mut self, dir: &Path);

    /// Logger receiving invocation events.
    fn set_logger(&mut self, logger: Logger);

    /// File that receives the output of every invocation.
    fn set_exec_log_path(&mut self, path: &Path);

    /// Upper bound for a single invocation.
    fn set_timeout(&mut self, timeout: Duration);

    /// Version string reported by the tool, e.g. `0.13.5`.
    async fn version(&self, cancel: &CancellationToken) -> Result<String, TfError>;

    /// Provider schemas for the current working directory.
    async fn provider_schemas(&self, cancel: &CancellationToken) -> Result<ProviderSchemas, TfError>;

    /// Path of the executable this executor runs.
    fn exec_path(&self) -> &Path;
}

/// An executor shared between a root module and its schema storage.
///
/// The mutex serialises reconfiguration (`set_workdir`) with invocations.
pub type SharedExecutor = Arc<tokio::sync::Mutex<Box<dyn Executor>>>;

/// Builds an executor for the binary at the given path.
pub type ExecutorFactory = Arc<dyn Fn(&Path) -> Box<dyn Executor> + Send + Sync>;

/// Locates the terraform binary when no explicit path is configured.
pub type DiscoveryFn = Arc<dyn Fn() -> Result<PathBuf, TfError> + Send + Sync>;

/// Wrap an executor so it can be shared.
pub fn share(executor: Box<dyn Executor>) -> SharedExecutor {
    Arc::new(tokio::sync::Mutex::new(executor))
}

/// Look the terraform binary up on `PATH`.
pub fn discover_terraform() -> Result<PathBuf, TfError> {
    which::which(TERRAFORM_BINARY).map_err(|e| TfError::TerraformNotFound {
        reason: e.to_string(),
    })
}

/// The default [`DiscoveryFn`], backed by [`discover_terraform`].
pub fn default_discovery() -> DiscoveryFn {
    Arc::new(discover_terraform)
}
