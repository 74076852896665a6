//! `tfroot inspect`: load one root module and describe what it knows.

use super::common::{ModuleSummary, build_manager, interrupt_token, validate_format};
use crate::config::Settings;
use crate::schema::SchemaReader;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Root module directory
    dir: PathBuf,

    /// Output format (table, json)
    #[arg(short = 'f', long, default_value = "table")]
    format: String,

    /// Describe a resource type using the cached schema
    #[arg(long, value_name = "TYPE")]
    resource: Option<String>,

    /// Describe a data source type using the cached schema
    #[arg(long, value_name = "TYPE")]
    data_source: Option<String>,
}

impl InspectCommand {
    pub async fn execute(self, settings: Settings) -> Result<()> {
        validate_format(&self.format)?;
        let dir = self
            .dir
            .canonicalize()
            .with_context(|| format!("Directory {} does not exist", self.dir.display()))?;

        let manager = build_manager(settings);
        let module = manager.add_and_load(&dir, &interrupt_token()).await?;
        let summary = ModuleSummary::collect(&module, &dir).await;

        let mut descriptions = BTreeMap::new();
        if self.resource.is_some() || self.data_source.is_some() {
            let parser = module.parser().await.context("Cannot describe blocks without a parser")?;
            if let Some(resource) = &self.resource {
                descriptions.insert(format!("resource {resource:?}"), parser.describe_block("resource", resource)?);
            }
            if let Some(data_source) = &self.data_source {
                descriptions.insert(format!("data {data_source:?}"), parser.describe_block("data", data_source)?);
            }
        }

        if self.format == "json" {
            let naming = module
                .schema_storage()
                .await
                .map(|storage| format!("{:?}", storage.naming_scheme()).to_lowercase());
            let output = serde_json::json!({
                "module": summary,
                "naming_scheme": naming,
                "descriptions": descriptions,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("{}", summary.render(true));
        if let Some(storage) = module.schema_storage().await
            && let Ok(providers) = storage.providers()
        {
            for provider in providers {
                println!("  {} {}", "-".dimmed(), provider.qualified_name());
            }
        }
        for (block, description) in descriptions {
            println!("\n{}\n  {description}", block.bold());
        }
        Ok(())
    }
}
