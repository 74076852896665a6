//! Helpers shared by the CLI commands.

use crate::config::Settings;
use crate::logging::Logger;
use crate::manager::{RootModuleManager, render_candidate_path};
use crate::rootmodule::{RootModule, RootModuleOptions};
use crate::schema::SchemaReader;
use anyhow::{Result, anyhow};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Output formats accepted by `--format`.
pub const FORMATS: [&str; 2] = ["table", "json"];

pub fn validate_format(format: &str) -> Result<()> {
    if FORMATS.contains(&format) {
        Ok(())
    } else {
        Err(anyhow!("Invalid format '{format}'. Valid formats are: {}", FORMATS.join(", ")))
    }
}

/// A manager whose root modules log into the CLI subscriber.
pub fn build_manager(settings: Settings) -> RootModuleManager {
    let options = RootModuleOptions::from_settings(&settings).with_logger(Logger::current());
    RootModuleManager::with_options(settings, options)
}

/// A token cancelled on Ctrl-C, killing any running terraform process.
pub fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling terraform invocations");
            trigger.cancel();
        }
    });
    token
}

/// What a command reports about one root module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    pub path: String,
    pub terraform_version: Option<String>,
    pub providers: Vec<String>,
    pub resources: usize,
    pub data_sources: usize,
    pub local_modules: Vec<String>,
    pub errors: Vec<String>,
}

impl ModuleSummary {
    /// Summarize a loaded root module, rendering paths relative to `root_dir`.
    pub async fn collect(module: &RootModule, root_dir: &Path) -> Self {
        let mut errors: Vec<String> = module
            .load_error()
            .map(|e| e.failures().iter().map(|f| format!("{}: {}", f.stage, f.error)).collect())
            .unwrap_or_default();

        let (mut providers, mut resources, mut data_sources) = (Vec::new(), 0, 0);
        match module.schema_storage().await {
            Some(storage) if storage.has_snapshot() => {
                match storage.providers() {
                    Ok(list) => providers = list.iter().map(|p| p.raw_name().to_string()).collect(),
                    Err(e) => errors.push(e.to_string()),
                }
                resources = storage.resources().map(|r| r.len()).unwrap_or_default();
                data_sources = storage.data_sources().map(|d| d.len()).unwrap_or_default();
            }
            _ => {}
        }
        providers.sort();

        let local_modules = module
            .module_manifest()
            .map(|m| {
                m.records()
                    .iter()
                    .filter(|r| !r.is_root() && !r.is_external())
                    .map(|r| render_candidate_path(root_dir, &m.record_dir(r)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            path: render_candidate_path(root_dir, module.path()),
            terraform_version: module.terraform_version().await,
            providers,
            resources,
            data_sources,
            local_modules,
            errors,
        }
    }

    /// Multi-line human readable rendering.
    pub fn render(&self, detailed: bool) -> String {
        let version = match &self.terraform_version {
            Some(v) => format!("terraform {v}").green().to_string(),
            None => "terraform unknown".yellow().to_string(),
        };
        let mut out = format!("{} ({version})", self.path.bold());

        if self.providers.is_empty() {
            out.push_str(&format!("\n  providers: {}", "none".dimmed()));
        } else {
            out.push_str(&format!(
                "\n  providers: {} ({} resources, {} data sources)",
                self.providers.join(", "),
                self.resources,
                self.data_sources
            ));
        }
        if detailed && !self.local_modules.is_empty() {
            out.push_str(&format!("\n  local modules: {}", self.local_modules.join(", ")));
        }
        for error in &self.errors {
            out.push_str(&format!("\n  {} {error}", "error:".red()));
        }
        out
    }
}
