//! Serde model of the `terraform providers schema -json` document.
//!
//! Only the fields the cache and its readers look at are modelled. Unknown fields
//! are ignored so newer format versions still decode.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level schema document keyed by provider name.
///
/// Providers are kept in a `BTreeMap` so lookups that return "the first match"
/// are deterministic: providers are searched in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSchemas {
    /// Document format version, e.g. `"0.1"`
    #[serde(default)]
    pub format_version: String,
    /// Schemas keyed by provider name as reported by the tool
    #[serde(default)]
    pub provider_schemas: BTreeMap<String, ProviderSchema>,
}

impl ProviderSchemas {
    /// Decode a document from the raw JSON output of the tool.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Everything one provider declares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSchema {
    /// Schema of the `provider` configuration block
    #[serde(default, rename = "provider")]
    pub config_schema: Option<Schema>,
    /// Resource schemas keyed by resource type name
    #[serde(default)]
    pub resource_schemas: BTreeMap<String, Schema>,
    /// Data source schemas keyed by data source type name
    #[serde(default)]
    pub data_source_schemas: BTreeMap<String, Schema>,
}

/// A versioned schema block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Provider-defined schema version
    #[serde(default)]
    pub version: u64,
    /// Root block of the schema
    #[serde(default)]
    pub block: SchemaBlock,
}

/// How a description is meant to be rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionKind {
    /// Plain text
    #[default]
    Plain,
    /// Markdown
    Markdown,
}

/// Attributes and nested blocks of a configuration block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaBlock {
    /// Attributes keyed by name
    #[serde(default)]
    pub attributes: BTreeMap<String, SchemaAttribute>,
    /// Nested block types keyed by name
    #[serde(default)]
    pub block_types: BTreeMap<String, NestedBlock>,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Rendering hint for `description`
    #[serde(default)]
    pub description_kind: DescriptionKind,
    /// Whether the whole block is deprecated
    #[serde(default)]
    pub deprecated: bool,
}

/// A single attribute of a block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaAttribute {
    /// Type expression as emitted by the tool (kept opaque)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub attribute_type: Option<serde_json::Value>,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Rendering hint for `description`
    #[serde(default)]
    pub description_kind: DescriptionKind,
    /// Must be set by the user
    #[serde(default)]
    pub required: bool,
    /// May be set by the user
    #[serde(default)]
    pub optional: bool,
    /// Set by the provider
    #[serde(default)]
    pub computed: bool,
    /// Value is hidden in output
    #[serde(default)]
    pub sensitive: bool,
    /// Attribute is deprecated
    #[serde(default)]
    pub deprecated: bool,
}

/// A nested block type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// Nesting mode, e.g. `list`, `set`, `single`
    #[serde(default)]
    pub nesting_mode: String,
    /// The nested block's own schema
    #[serde(default)]
    pub block: SchemaBlock,
    /// Minimum number of occurrences
    #[serde(default)]
    pub min_items: u64,
    /// Maximum number of occurrences (0 means unbounded)
    #[serde(default)]
    pub max_items: u64,
}
