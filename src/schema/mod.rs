//! Provider schema model and cache.
//!
//! # Modules
//!
//! - [`document`] - Serde model of the schema document produced by the tool
//! - [`identity`] - Provider identities and the raw/qualified naming schemes
//! - [`storage`] - [`SchemaStorage`], the per-root-module cache
//!
//! Consumers such as language parsers only see the read side, [`SchemaReader`].
//! Refreshing is done by the root module through
//! [`SchemaStorage::obtain_schemas_for_module`].

pub mod document;
pub mod identity;
pub mod storage;

pub use document::{DescriptionKind, ProviderSchema, ProviderSchemas, Schema, SchemaBlock};
pub use identity::{IdentityConverter, NamingScheme, ProviderIdentity};
pub use storage::SchemaStorage;

use crate::core::TfError;

/// A resource type known to the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Resource type name, e.g. `aws_instance`
    pub name: String,
    /// Provider declaring the resource
    pub provider: ProviderIdentity,
    /// Human-readable description
    pub description: String,
    /// Rendering hint for the description
    pub description_kind: DescriptionKind,
}

/// A data source type known to the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSource {
    /// Data source type name, e.g. `aws_ami`
    pub name: String,
    /// Provider declaring the data source
    pub provider: ProviderIdentity,
    /// Human-readable description
    pub description: String,
    /// Rendering hint for the description
    pub description_kind: DescriptionKind,
}

/// Read access to cached provider schemas.
///
/// Every method fails with [`TfError::SchemaBusy`] while a refresh is running and
/// with [`TfError::NoSchemaAvailable`] before the first successful refresh.
pub trait SchemaReader: Send + Sync {
    /// Configuration schema of the provider with the given raw name.
    fn provider_config_schema(&self, raw_name: &str) -> Result<Schema, TfError>;

    /// All providers in the snapshot.
    fn providers(&self) -> Result<Vec<ProviderIdentity>, TfError>;

    /// Schema of a resource type, searched across all providers.
    fn resource_schema(&self, resource_type: &str) -> Result<Schema, TfError>;

    /// All resource types in the snapshot.
    fn resources(&self) -> Result<Vec<Resource>, TfError>;

    /// Schema of a data source type, searched across all providers.
    fn data_source_schema(&self, data_source_type: &str) -> Result<Schema, TfError>;

    /// All data source types in the snapshot.
    fn data_sources(&self) -> Result<Vec<DataSource>, TfError>;
}
