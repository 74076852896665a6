//! Per-root-module provider schema cache.
//!
//! [`SchemaStorage`] keeps at most one [`ProviderSchemas`] snapshot. Refreshing it and
//! reading from it are serialised through a single-permit semaphore (the exclusion
//! slot), used asymmetrically:
//!
//! - [`SchemaStorage::obtain_schemas_for_module`] waits for the slot, so concurrent
//!   refreshes queue up behind each other.
//! - Every [`SchemaReader`] method only *tries* to take the slot and fails with
//!   [`TfError::SchemaBusy`] while a refresh holds it.
//!
//! Readers therefore never stall behind a slow `terraform providers schema` call.
//! The snapshot itself is swapped as a whole, so a reader sees either the old
//! document or the new one.

use super::{DataSource, ProviderIdentity, ProviderSchemas, Resource, Schema, SchemaReader};
use super::identity::NamingScheme;
use crate::constants::{MIN_SUPPORTED_VERSION, REGISTRY_NAMING_VERSION};
use crate::core::TfError;
use crate::exec::SharedExecutor;
use crate::logging::Logger;
use crate::version::parse_version;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Cache of provider schemas for one root module.
#[derive(Debug)]
pub struct SchemaStorage {
    snapshot: RwLock<Option<Arc<ProviderSchemas>>>,
    scheme: NamingScheme,
    logger: Logger,
    slot: Semaphore,
}

impl SchemaStorage {
    /// Create a storage using `scheme` for provider names.
    pub fn new(scheme: NamingScheme) -> Self {
        Self {
            snapshot: RwLock::new(None),
            scheme,
            logger: Logger::discard(),
            slot: Semaphore::new(1),
        }
    }

    /// Create a storage suitable for the given terraform version.
    ///
    /// - `>= 0.13.0` uses registry-qualified provider names
    /// - `>= 0.12.0, < 0.13.0` uses raw names unchanged
    /// - anything older fails with [`TfError::UnsupportedVersion`]
    pub fn for_version(version: &str) -> Result<Self, TfError> {
        let parsed = parse_version(version)?;

        if parsed >= REGISTRY_NAMING_VERSION {
            return Ok(Self::new(NamingScheme::Registry));
        }
        if parsed >= MIN_SUPPORTED_VERSION {
            return Ok(Self::new(NamingScheme::Legacy));
        }

        Err(TfError::UnsupportedVersion {
            version: version.to_string(),
        })
    }

    /// Attach a logger. Called before the storage is shared.
    #[must_use]
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// The naming scheme chosen at construction.
    pub const fn naming_scheme(&self) -> NamingScheme {
        self.scheme
    }

    /// Returns true once a snapshot has been stored, regardless of the slot.
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.read().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Obtain schemas for the module in `dir` via `executor` and store them.
    ///
    /// Waits for the exclusion slot, points the executor at `dir` and replaces the
    /// snapshot on success. The slot is released on every exit path.
    pub async fn obtain_schemas_for_module(
        &self,
        cancel: &CancellationToken,
        executor: &SharedExecutor,
        dir: &Path,
    ) -> Result<(), TfError> {
        self.logger.scope(|| {
            tracing::debug!(target: "schema", "Acquiring semaphore before retrieving schema for {:?} ...", dir);
        });
        let _permit = self.slot.acquire().await.map_err(|e| TfError::Other {
            message: format!("failed to acquire semaphore: {e}"),
        })?;

        let mut tf = executor.lock().await;
        tf.set_workdir(dir);

        self.logger.scope(|| {
            tracing::debug!(target: "schema", "Retrieving schemas for {:?} ...", dir);
        });
        let start = Instant::now();
        let schemas = tf.provider_schemas(cancel).await.map_err(|e| match e {
            TfError::Cancelled {
                ..
            } => e,
            other => TfError::Other {
                message: format!("Unable to retrieve schemas for {}: {other}", dir.display()),
            },
        })?;
        drop(tf);

        self.replace_snapshot(schemas);
        self.logger.scope(|| {
            tracing::info!(target: "schema", "Schemas retrieved for {:?} in {:?}", dir, start.elapsed());
        });
        Ok(())
    }

    fn replace_snapshot(&self, schemas: ProviderSchemas) {
        let mut guard = self.snapshot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(Arc::new(schemas));
    }

    fn schema(&self) -> Result<Arc<ProviderSchemas>, TfError> {
        self.logger.scope(|| {
            tracing::trace!(target: "schema", "Acquiring semaphore before reading schema");
        });
        let _permit = self.slot.try_acquire().map_err(|_| TfError::SchemaBusy)?;

        let guard = self.snapshot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone().ok_or(TfError::NoSchemaAvailable)
    }
}

impl SchemaReader for SchemaStorage {
    fn provider_config_schema(&self, raw_name: &str) -> Result<Schema, TfError> {
        let identity = ProviderIdentity::from_raw(raw_name, self.scheme);
        let qualified = identity.qualified_name();
        self.logger.scope(|| {
            tracing::debug!(target: "schema", "Reading {:?} provider schema", qualified);
        });

        let ps = self.schema()?;
        ps.provider_schemas
            .get(&qualified)
            .and_then(|p| p.config_schema.clone())
            .ok_or_else(|| TfError::SchemaUnavailable {
                kind: "provider".to_string(),
                name: qualified,
            })
    }

    fn providers(&self) -> Result<Vec<ProviderIdentity>, TfError> {
        let ps = self.schema()?;
        Ok(ps
            .provider_schemas
            .keys()
            .map(|qualified| ProviderIdentity::from_qualified(qualified, self.scheme))
            .collect())
    }

    fn resource_schema(&self, resource_type: &str) -> Result<Schema, TfError> {
        self.logger.scope(|| {
            tracing::debug!(target: "schema", "Reading {:?} resource schema", resource_type);
        });
        let ps = self.schema()?;

        // Provider aliases are not resolved: the first provider declaring the type wins.
        ps.provider_schemas
            .values()
            .find_map(|p| p.resource_schemas.get(resource_type).cloned())
            .ok_or_else(|| TfError::SchemaUnavailable {
                kind: "resource".to_string(),
                name: resource_type.to_string(),
            })
    }

    fn resources(&self) -> Result<Vec<Resource>, TfError> {
        let ps = self.schema()?;

        let mut resources = Vec::new();
        for (provider, schema) in &ps.provider_schemas {
            let identity = ProviderIdentity::from_qualified(provider, self.scheme);
            for (name, r) in &schema.resource_schemas {
                resources.push(Resource {
                    name: name.clone(),
                    provider: identity.clone(),
                    description: r.block.description.clone(),
                    description_kind: r.block.description_kind,
                });
            }
        }
        Ok(resources)
    }

    fn data_source_schema(&self, data_source_type: &str) -> Result<Schema, TfError> {
        self.logger.scope(|| {
            tracing::debug!(target: "schema", "Reading {:?} datasource schema", data_source_type);
        });
        let ps = self.schema()?;

        // Same alias limitation as resource_schema.
        ps.provider_schemas
            .values()
            .find_map(|p| p.data_source_schemas.get(data_source_type).cloned())
            .ok_or_else(|| TfError::SchemaUnavailable {
                kind: "data".to_string(),
                name: data_source_type.to_string(),
            })
    }

    fn data_sources(&self) -> Result<Vec<DataSource>, TfError> {
        let ps = self.schema()?;

        let mut data_sources = Vec::new();
        for (provider, schema) in &ps.provider_schemas {
            let identity = ProviderIdentity::from_qualified(provider, self.scheme);
            for (name, d) in &schema.data_source_schemas {
                data_sources.push(DataSource {
                    name: name.clone(),
                    provider: identity.clone(),
                    description: d.block.description.clone(),
                    description_kind: d.block.description_kind,
                });
            }
        }
        Ok(data_sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec;
    use crate::test_utils::{FakeExecutor, sample_schemas};
    use std::collections::HashSet;
    use std::time::Duration;

    async fn loaded_storage(version: &str) -> SchemaStorage {
        let storage = SchemaStorage::for_version(version).unwrap();
        let executor = exec::share(Box::new(FakeExecutor::new("0.13.0").with_schemas(sample_schemas())));
        storage
            .obtain_schemas_for_module(&CancellationToken::new(), &executor, Path::new("/proj"))
            .await
            .unwrap();
        storage
    }

    #[test]
    fn test_version_selects_naming_scheme() {
        assert_eq!(SchemaStorage::for_version("0.13.0").unwrap().naming_scheme(), NamingScheme::Registry);
        assert_eq!(SchemaStorage::for_version("1.6.2").unwrap().naming_scheme(), NamingScheme::Registry);
        assert_eq!(SchemaStorage::for_version("0.12.0").unwrap().naming_scheme(), NamingScheme::Legacy);
        assert_eq!(SchemaStorage::for_version("0.12.31").unwrap().naming_scheme(), NamingScheme::Legacy);
        assert_eq!(
            SchemaStorage::for_version("0.13.0-beta1").unwrap().naming_scheme(),
            NamingScheme::Legacy
        );
    }

    #[test]
    fn test_old_version_is_unsupported() {
        let err = SchemaStorage::for_version("0.11.14").unwrap_err();
        assert!(matches!(err, TfError::UnsupportedVersion { ref version } if version == "0.11.14"));
    }

    #[test]
    fn test_invalid_version_is_rejected() {
        assert!(matches!(SchemaStorage::for_version("banana"), Err(TfError::InvalidVersion { .. })));
    }

    #[test]
    fn test_reads_before_refresh_have_no_schema() {
        let storage = SchemaStorage::new(NamingScheme::Registry);
        assert!(matches!(storage.providers(), Err(TfError::NoSchemaAvailable)));
        assert!(matches!(storage.resource_schema("aws_instance"), Err(TfError::NoSchemaAvailable)));
        assert!(!storage.has_snapshot());
    }

    #[tokio::test]
    async fn test_providers_are_reported_raw() {
        let storage = loaded_storage("0.13.0").await;
        let names: HashSet<String> =
            storage.providers().unwrap().iter().map(|p| p.raw_name().to_string()).collect();
        assert_eq!(names, HashSet::from(["aws".to_string(), "null".to_string()]));
        assert!(storage.has_snapshot());
    }

    #[tokio::test]
    async fn test_provider_config_schema_by_raw_name() {
        let storage = loaded_storage("0.13.0").await;
        let schema = storage.provider_config_schema("aws").unwrap();
        assert_eq!(schema.block.description, "Amazon Web Services");

        let err = storage.provider_config_schema("google").unwrap_err();
        assert!(matches!(
            err,
            TfError::SchemaUnavailable { ref kind, ref name }
                if kind == "provider" && name == "registry.terraform.io/hashicorp/google"
        ));
    }

    #[tokio::test]
    async fn test_provider_without_config_block_is_unavailable() {
        let storage = loaded_storage("0.13.0").await;
        assert!(matches!(
            storage.provider_config_schema("null"),
            Err(TfError::SchemaUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_resource_and_data_source_lookup() {
        let storage = loaded_storage("0.13.0").await;
        assert_eq!(storage.resource_schema("aws_instance").unwrap().block.description, "An EC2 instance");
        assert!(storage.data_source_schema("aws_ami").is_ok());
        assert!(matches!(
            storage.resource_schema("aws_ami"),
            Err(TfError::SchemaUnavailable { ref kind, .. }) if kind == "resource"
        ));
        assert!(matches!(
            storage.data_source_schema("null_resource"),
            Err(TfError::SchemaUnavailable { ref kind, .. }) if kind == "data"
        ));
    }

    #[tokio::test]
    async fn test_resource_lookup_returns_first_provider_match() {
        let storage = loaded_storage("0.13.0").await;
        // "shared_thing" is declared by both providers; aws sorts first
        let schema = storage.resource_schema("shared_thing").unwrap();
        assert_eq!(schema.block.description, "aws flavour");
    }

    #[tokio::test]
    async fn test_enumerations_carry_raw_provider_names() {
        let storage = loaded_storage("0.13.0").await;

        let resources = storage.resources().unwrap();
        let instance = resources.iter().find(|r| r.name == "aws_instance").unwrap();
        assert_eq!(instance.provider.raw_name(), "aws");
        assert_eq!(instance.description, "An EC2 instance");

        let data_sources = storage.data_sources().unwrap();
        assert!(data_sources.iter().any(|d| d.name == "aws_ami" && d.provider.raw_name() == "aws"));
    }

    #[tokio::test]
    async fn test_legacy_storage_keeps_names() {
        let storage = SchemaStorage::for_version("0.12.29").unwrap();
        let mut doc = ProviderSchemas::default();
        doc.provider_schemas.insert("aws".to_string(), Default::default());
        let executor = exec::share(Box::new(FakeExecutor::new("0.12.29").with_schemas(doc)));
        storage
            .obtain_schemas_for_module(&CancellationToken::new(), &executor, Path::new("/proj"))
            .await
            .unwrap();

        let providers = storage.providers().unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].raw_name(), "aws");
        assert_eq!(providers[0].qualified_name(), "aws");
    }

    #[tokio::test]
    async fn test_refresh_points_executor_at_dir() {
        let storage = SchemaStorage::new(NamingScheme::Registry);
        let fake = FakeExecutor::new("0.13.0").with_schemas(sample_schemas());
        let workdirs = fake.workdirs();
        let executor = exec::share(Box::new(fake));
        storage
            .obtain_schemas_for_module(&CancellationToken::new(), &executor, Path::new("/proj/env/prod"))
            .await
            .unwrap();
        assert_eq!(workdirs.lock().unwrap().last().map(|p| p.as_path()), Some(Path::new("/proj/env/prod")));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot_and_releases_slot() {
        let storage = loaded_storage("0.13.0").await;
        let failing = exec::share(Box::new(FakeExecutor::new("0.13.0").failing_schemas("boom")));

        let err = storage
            .obtain_schemas_for_module(&CancellationToken::new(), &failing, Path::new("/proj"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));

        // slot released and old snapshot intact
        assert_eq!(storage.providers().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reads_fail_fast_during_refresh() {
        let storage = Arc::new(SchemaStorage::new(NamingScheme::Registry));
        let fake = FakeExecutor::new("0.13.0").with_schemas(sample_schemas());
        let gate = fake.gate();
        let executor = exec::share(Box::new(fake));

        let refresh = {
            let storage = storage.clone();
            let executor = executor.clone();
            tokio::spawn(async move {
                storage
                    .obtain_schemas_for_module(&CancellationToken::new(), &executor, Path::new("/proj"))
                    .await
            })
        };

        gate.wait_entered().await;
        let started = Instant::now();
        assert!(matches!(storage.provider_config_schema("aws"), Err(TfError::SchemaBusy)));
        assert!(matches!(storage.providers(), Err(TfError::SchemaBusy)));
        assert!(matches!(storage.resource_schema("aws_instance"), Err(TfError::SchemaBusy)));
        assert!(matches!(storage.resources(), Err(TfError::SchemaBusy)));
        assert!(matches!(storage.data_source_schema("aws_ami"), Err(TfError::SchemaBusy)));
        assert!(matches!(storage.data_sources(), Err(TfError::SchemaBusy)));
        assert!(started.elapsed() < Duration::from_secs(1));

        gate.release();
        refresh.await.unwrap().unwrap();
        assert_eq!(storage.providers().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_queue() {
        let storage = Arc::new(SchemaStorage::new(NamingScheme::Registry));
        let fake = FakeExecutor::new("0.13.0").with_schemas(sample_schemas());
        let gate = fake.gate();
        let calls = fake.schema_calls();
        let executor = exec::share(Box::new(fake));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let storage = storage.clone();
            let executor = executor.clone();
            handles.push(tokio::spawn(async move {
                storage
                    .obtain_schemas_for_module(&CancellationToken::new(), &executor, Path::new("/proj"))
                    .await
            }));
        }

        gate.wait_entered().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1, "second refresh must wait");

        gate.release();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_refresh_is_reported() {
        let storage = SchemaStorage::new(NamingScheme::Registry);
        let fake = FakeExecutor::new("0.13.0").with_schemas(sample_schemas());
        let _gate = fake.gate();
        let executor = exec::share(Box::new(fake));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = storage
            .obtain_schemas_for_module(&cancel, &executor, Path::new("/proj"))
            .await
            .unwrap_err();
        assert!(matches!(err, TfError::Cancelled { .. }));
        assert!(matches!(storage.providers(), Err(TfError::NoSchemaAvailable)));
    }
}
