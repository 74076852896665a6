//! Module manifest parsing.
//!
//! `terraform init` records every module it installed for a root module in
//! `.terraform/modules/modules.json`:
//!
//! ```json
//! {"Modules": [
//!   {"Key": "", "Source": "", "Dir": "."},
//!   {"Key": "vpc", "Source": "terraform-aws-modules/vpc/aws", "Version": "2.44.0",
//!    "Dir": ".terraform/modules/vpc/terraform-aws-modules-terraform-aws-vpc-1a2b3c"},
//!   {"Key": "local", "Source": "./modules/local", "Dir": "modules/local"}
//! ]}
//! ```
//!
//! `Dir` is relative to the root module directory.

use crate::core::TfError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const LOCAL_SOURCE_PREFIXES: [&str; 4] = ["./", "../", ".\\", "..\\"];

/// One installed module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Dotted call path, empty for the root module.
    #[serde(rename = "Key")]
    pub key: String,

    /// Source address as written in the `module` block.
    #[serde(rename = "Source", default)]
    pub source_addr: String,

    /// Resolved version, registry modules only.
    #[serde(rename = "Version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Installation directory, relative to the root module.
    #[serde(rename = "Dir")]
    pub dir: String,
}

impl ModuleRecord {
    /// Returns true for the record describing the root module itself.
    pub fn is_root(&self) -> bool {
        self.key.is_empty()
    }

    /// Returns true if the module was downloaded rather than referenced locally.
    pub fn is_external(&self) -> bool {
        !self.is_root() && !LOCAL_SOURCE_PREFIXES.iter().any(|p| self.source_addr.starts_with(p))
    }
}

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    #[serde(rename = "Modules", default)]
    modules: Vec<ModuleRecord>,
}

/// Parsed module manifest of one root module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleManifest {
    root_dir: PathBuf,
    records: Vec<ModuleRecord>,
}

impl ModuleManifest {
    pub fn new(root_dir: impl Into<PathBuf>, records: Vec<ModuleRecord>) -> Self {
        Self {
            root_dir: root_dir.into(),
            records,
        }
    }

    /// Parse manifest JSON for the root module in `root_dir`.
    pub fn parse(root_dir: impl Into<PathBuf>, content: &[u8]) -> Result<Self, serde_json::Error> {
        let document: ManifestDocument = serde_json::from_slice(content)?;
        Ok(Self::new(root_dir, document.modules))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn records(&self) -> &[ModuleRecord] {
        &self.records
    }

    /// Absolute directory of a record.
    pub fn record_dir(&self, record: &ModuleRecord) -> PathBuf {
        self.root_dir.join(&record.dir)
    }
}

/// Read and parse the manifest at `path`.
///
/// The root directory is derived from the manifest location, two levels above the
/// `.terraform/modules` directory.
pub fn parse_module_manifest_from_file(path: &Path) -> Result<ModuleManifest, TfError> {
    let manifest_error = |reason: String| TfError::ManifestParse {
        file: path.display().to_string(),
        reason,
    };

    let content = std::fs::read(path).map_err(|e| manifest_error(e.to_string()))?;
    let root_dir = super::files::root_module_dir_from_file_path(path);
    ModuleManifest::parse(root_dir, &content).map_err(|e| manifest_error(e.to_string()))
}
