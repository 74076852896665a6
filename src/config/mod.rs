//! User settings for tfroot.
//!
//! Settings live in a TOML file, looked up in this order:
//!
//! 1. the path passed with `--config`
//! 2. `$TFROOT_CONFIG`
//! 3. `<config dir>/tfroot/config.toml` (`~/.config` on Linux,
//!    `~/Library/Application Support` on macOS, `%APPDATA%` on Windows)
//!
//! An explicitly named file must exist; a missing default file means defaults.
//!
//! ```toml
//! terraform_exec_path = "~/bin/terraform"
//! terraform_exec_timeout_secs = 60
//! terraform_exec_log_path = "$TMPDIR/tfroot-exec.log"
//! exclude_dirs = ["node_modules", "vendor"]
//! ```
//!
//! Paths may use `~` and `$VAR`. `TFROOT_TERRAFORM_PATH` and `TFROOT_TERRAFORM_TIMEOUT`
//! override the corresponding file values.

use crate::constants::{CONFIG_PATH_ENV, TERRAFORM_PATH_ENV, TERRAFORM_TIMEOUT_ENV};
use crate::utils::platform::expand_path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Settings shared by every root module the process manages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Terraform binary; looked up on `PATH` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terraform_exec_path: Option<PathBuf>,

    /// Upper bound for one terraform invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terraform_exec_timeout_secs: Option<u64>,

    /// File receiving the output of every terraform invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terraform_exec_log_path: Option<PathBuf>,

    /// Directory names skipped when walking a workspace for root modules.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_dirs: Vec<String>,
}

impl Settings {
    /// Load settings following the lookup order, then apply environment overrides.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);

        let mut settings = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::load_from(&path).await?,
            None => {
                let path = Self::default_path()?;
                if fs::try_exists(&path).await.unwrap_or(false) {
                    Self::load_from(&path).await?
                } else {
                    tracing::debug!(target: "config", "No settings at {}, using defaults", path.display());
                    Self::default()
                }
            }
        };

        settings.apply_env_overrides()?;
        Ok(settings)
    }

    /// Load settings from `path` without consulting the environment.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        let mut settings: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))?;
        settings.expand_paths()?;

        tracing::debug!(target: "config", "Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// `<config dir>/tfroot/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine configuration directory"))?;
        Ok(dir.join("tfroot").join("config.toml"))
    }

    /// Apply `TFROOT_TERRAFORM_PATH` and `TFROOT_TERRAFORM_TIMEOUT`.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var(TERRAFORM_PATH_ENV)
            && !path.is_empty()
        {
            self.terraform_exec_path = Some(expand_path(&path)?);
        }

        if let Ok(timeout) = std::env::var(TERRAFORM_TIMEOUT_ENV)
            && !timeout.is_empty()
        {
            let secs = timeout
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{TERRAFORM_TIMEOUT_ENV} must be a number of seconds, got {timeout:?}"))?;
            self.terraform_exec_timeout_secs = Some(secs);
        }
        Ok(())
    }

    fn expand_paths(&mut self) -> Result<()> {
        for path in [&mut self.terraform_exec_path, &mut self.terraform_exec_log_path].into_iter().flatten() {
            let expanded = expand_path(&path.to_string_lossy())?;
            *path = expanded;
        }
        Ok(())
    }

    pub fn exec_timeout(&self) -> Option<Duration> {
        self.terraform_exec_timeout_secs.map(Duration::from_secs)
    }

    /// Returns true if a directory called `name` should not be searched.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name)
    }
}
