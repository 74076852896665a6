//! Root module orchestration.
//!
//! A [`RootModule`] is a directory in which `terraform init` has been run. It owns
//! the state needed to answer schema questions for that directory and brings it up
//! through a six-stage load pipeline:
//!
//! 1. read the module manifest (`.terraform/modules/modules.json`)
//! 2. construct a terraform [`Executor`](crate::exec::Executor)
//! 3. ask the executor for the terraform version
//! 4. pick a [`SchemaStorage`] suited to that version
//! 5. pick a compatible [`Parser`] and wire the storage into it
//! 6. fill the storage via `terraform providers schema -json`
//!
//! A failing stage does not stop the pipeline. Later stages whose prerequisite is
//! missing simply do nothing, and every failure of stages 1-5 is collected into a
//! [`LoadError`]. Stage 6 only logs its failures.
//!
//! # Locking
//!
//! State is split into two domains so that a slow schema refresh never blocks
//! questions about module paths:
//!
//! - the manifest domain (manifest file and parsed manifest) behind a
//!   `std::sync::RwLock`, never held across an `.await`
//! - the plugin domain (lock file, executor, version, storage, parser) behind a
//!   `tokio::sync::RwLock`, held for the whole schema refresh
//!
//! Stage flags and the loading flag are atomics. "Loaded" flags mean the stage was
//! *attempted*: [`RootModule::is_terraform_loaded`] can be true while
//! [`RootModule::terraform_executor`] still fails with
//! [`TfError::NoResourceAvailable`].
//!
//! # Modules
//!
//! - [`files`] - tracked cache files and their on-disk locations
//! - [`manifest`] - module manifest parsing

pub mod files;
pub mod manifest;

pub use files::{File, TrackedFile};
pub use manifest::{ModuleManifest, ModuleRecord};

use crate::config::Settings;
use crate::core::{LoadError, LoadStage, TfError};
use crate::exec::{self, DiscoveryFn, ExecutorFactory, SharedExecutor, TerraformExecutor};
use crate::lang::{self, Parser, ParserFinder};
use crate::logging::Logger;
use crate::schema::{SchemaReader, SchemaStorage};
use crate::utils::platform::paths_equal;
use files::{find_file, module_manifest_file_path, plugin_lock_file_paths, root_module_dir_from_file_path};
use manifest::parse_module_manifest_from_file;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How a [`RootModule`] finds and configures its collaborators.
#[derive(Clone)]
pub struct RootModuleOptions {
    /// Explicit terraform binary; `discovery` is used when unset.
    pub exec_path: Option<PathBuf>,
    /// Per-invocation timeout handed to the executor.
    pub exec_timeout: Option<Duration>,
    /// File receiving the output of every terraform invocation.
    pub exec_log_path: Option<PathBuf>,
    pub logger: Logger,
    pub discovery: DiscoveryFn,
    pub executor_factory: ExecutorFactory,
    pub parser_finder: ParserFinder,
}

impl Default for RootModuleOptions {
    fn default() -> Self {
        Self {
            exec_path: None,
            exec_timeout: None,
            exec_log_path: None,
            logger: Logger::discard(),
            discovery: exec::default_discovery(),
            executor_factory: TerraformExecutor::factory(),
            parser_finder: lang::default_parser_finder(),
        }
    }
}

impl RootModuleOptions {
    /// Options carrying the terraform settings of `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            exec_path: settings.terraform_exec_path.clone(),
            exec_timeout: settings.exec_timeout(),
            exec_log_path: settings.terraform_exec_log_path.clone(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    #[must_use]
    pub fn with_discovery(mut self, discovery: DiscoveryFn) -> Self {
        self.discovery = discovery;
        self
    }

    #[must_use]
    pub fn with_executor_factory(mut self, factory: ExecutorFactory) -> Self {
        self.executor_factory = factory;
        self
    }

    #[must_use]
    pub fn with_parser_finder(mut self, finder: ParserFinder) -> Self {
        self.parser_finder = finder;
        self
    }
}

impl std::fmt::Debug for RootModuleOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootModuleOptions")
            .field("exec_path", &self.exec_path)
            .field("exec_timeout", &self.exec_timeout)
            .field("exec_log_path", &self.exec_log_path)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct ManifestState {
    file: Option<TrackedFile>,
    manifest: Option<Arc<ModuleManifest>>,
}

#[derive(Default)]
struct PluginState {
    lock_file: Option<TrackedFile>,
    executor: Option<SharedExecutor>,
    version: Option<String>,
    schema_storage: Option<Arc<SchemaStorage>>,
    parser: Option<Arc<dyn Parser>>,
}

/// A terraform root module and its cached tool state.
pub struct RootModule {
    path: PathBuf,
    options: RootModuleOptions,

    is_loading: AtomicBool,
    cancel_token: Mutex<Option<CancellationToken>>,
    load_error: Mutex<Option<Arc<LoadError>>>,

    terraform_loaded: AtomicBool,
    parser_loaded: AtomicBool,
    schema_loaded: AtomicBool,

    manifest_state: RwLock<ManifestState>,
    plugin_state: tokio::sync::RwLock<PluginState>,
}

impl RootModule {
    /// Create an unloaded root module for `dir`.
    pub fn new(dir: impl Into<PathBuf>, options: RootModuleOptions) -> Self {
        Self {
            path: dir.into(),
            options,
            is_loading: AtomicBool::new(false),
            cancel_token: Mutex::new(None),
            load_error: Mutex::new(None),
            terraform_loaded: AtomicBool::new(false),
            parser_loaded: AtomicBool::new(false),
            schema_loaded: AtomicBool::new(false),
            manifest_state: RwLock::new(ManifestState::default()),
            plugin_state: tokio::sync::RwLock::new(PluginState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn logger(&self) -> &Logger {
        &self.options.logger
    }

    fn manifest_read(&self) -> RwLockReadGuard<'_, ManifestState> {
        self.manifest_state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn manifest_write(&self) -> RwLockWriteGuard<'_, ManifestState> {
        self.manifest_state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locate the plugin lock file and module manifest on disk.
    ///
    /// Missing files are not an error; the module is simply not initialized yet.
    pub async fn discover_caches(&self) -> Result<(), TfError> {
        let mut failures = Vec::new();
        if let Err(e) = self.discover_plugin_cache().await {
            failures.push(e);
        }
        if let Err(e) = self.discover_module_cache() {
            failures.push(e);
        }

        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(TfError::Other {
                message: failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "),
            }),
        }
    }

    async fn discover_plugin_cache(&self) -> Result<(), TfError> {
        let mut plugin = self.plugin_state.write().await;
        match find_file(&plugin_lock_file_paths(&self.path)) {
            Ok(file) => {
                plugin.lock_file = Some(file);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.logger().scope(|| {
                    tracing::debug!(target: "rootmodule", "No plugin cache found in {:?}", self.path);
                });
                Ok(())
            }
            Err(e) => Err(TfError::IoError(e)),
        }
    }

    fn discover_module_cache(&self) -> Result<(), TfError> {
        let mut state = self.manifest_write();
        match TrackedFile::open(module_manifest_file_path(&self.path)) {
            Ok(file) => {
                state.file = Some(file);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.logger().scope(|| {
                    tracing::debug!(target: "rootmodule", "No module manifest found in {:?}", self.path);
                });
                Ok(())
            }
            Err(e) => Err(TfError::IoError(e)),
        }
    }

    /// Run the load pipeline to completion.
    ///
    /// The outcome is also recorded as [`RootModule::load_error`].
    pub async fn load(&self, cancel: &CancellationToken) -> Result<(), LoadError> {
        self.is_loading.store(true, Ordering::SeqCst);
        let mut errors = LoadError::new();

        let manifest_file = self.manifest_read().file.clone();
        errors.record(
            LoadStage::ModuleManifest,
            self.update_module_manifest(manifest_file.as_ref().map(|f| f as &dyn File)),
        );
        errors.record(LoadStage::ExecutorDiscovery, self.discover_terraform_executor().await);
        errors.record(LoadStage::VersionDiscovery, self.discover_terraform_version(cancel).await);
        errors.record(LoadStage::SchemaStorage, self.find_compatible_schema_storage().await);
        errors.record(LoadStage::Parser, self.find_compatible_lang_parser().await);

        let lock_file = self.plugin_state.read().await.lock_file.clone();
        if let Err(e) = self.update_schema_cache(cancel, lock_file.as_ref().map(|f| f as &dyn File)).await {
            self.logger().scope(|| {
                tracing::warn!(target: "rootmodule", "Schema cache update failed for {:?}: {}", self.path, e);
            });
        }

        let result = errors.into_result();
        self.set_load_error(result.as_ref().err().cloned());
        self.cancel_loading();

        self.logger().scope(|| match &result {
            Ok(()) => tracing::info!(target: "rootmodule", "Root module {:?} loaded", self.path),
            Err(e) => tracing::warn!(target: "rootmodule", "Root module {:?} loaded with {}", self.path, e),
        });
        result
    }

    /// Run [`RootModule::load`] on a background task.
    ///
    /// The returned handle may be dropped; the outcome stays available through
    /// [`RootModule::load_error`].
    pub fn start_loading(self: &Arc<Self>) -> JoinHandle<Result<(), LoadError>> {
        let token = CancellationToken::new();
        *self.cancel_token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        self.is_loading.store(true, Ordering::SeqCst);

        let module = Arc::clone(self);
        tokio::spawn(async move {
            module.logger().scope(|| {
                tracing::debug!(target: "rootmodule", "Loading root module {:?} in the background", module.path);
            });
            module.load(&token).await
        })
    }

    /// Cancel an in-progress background load and clear the loading flag.
    pub fn cancel_loading(&self) {
        if self.is_loading.load(Ordering::SeqCst)
            && let Some(token) = self.cancel_token.lock().unwrap_or_else(PoisonError::into_inner).as_ref()
        {
            token.cancel();
        }
        self.is_loading.store(false, Ordering::SeqCst);
    }

    pub fn is_loading_done(&self) -> bool {
        !self.is_loading.load(Ordering::SeqCst)
    }

    /// True once executor construction has been attempted.
    pub fn is_terraform_loaded(&self) -> bool {
        self.terraform_loaded.load(Ordering::SeqCst)
    }

    /// True once parser selection has been attempted.
    pub fn is_parser_loaded(&self) -> bool {
        self.parser_loaded.load(Ordering::SeqCst)
    }

    /// True once a schema refresh has been attempted.
    pub fn is_schema_loaded(&self) -> bool {
        self.schema_loaded.load(Ordering::SeqCst)
    }

    /// The aggregated error of the most recent load, if it failed.
    pub fn load_error(&self) -> Option<Arc<LoadError>> {
        self.load_error.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_load_error(&self, error: Option<LoadError>) {
        *self.load_error.lock().unwrap_or_else(PoisonError::into_inner) = error.map(Arc::new);
    }

    pub async fn parser(&self) -> Result<Arc<dyn Parser>, TfError> {
        let plugin = self.plugin_state.read().await;
        if !self.is_parser_loaded() {
            return Err(TfError::not_loaded("parser"));
        }
        plugin.parser.clone().ok_or_else(|| TfError::not_available("parser"))
    }

    pub async fn terraform_executor(&self) -> Result<SharedExecutor, TfError> {
        let plugin = self.plugin_state.read().await;
        if !self.is_terraform_loaded() {
            return Err(TfError::not_loaded("terraform executor"));
        }
        plugin.executor.clone().ok_or_else(|| TfError::not_available("terraform executor"))
    }

    /// Terraform version found by the last load.
    pub async fn terraform_version(&self) -> Option<String> {
        self.plugin_state.read().await.version.clone()
    }

    pub async fn schema_storage(&self) -> Option<Arc<SchemaStorage>> {
        self.plugin_state.read().await.schema_storage.clone()
    }

    /// The parsed module manifest, if one is loaded.
    pub fn module_manifest(&self) -> Option<Arc<ModuleManifest>> {
        self.manifest_read().manifest.clone()
    }

    /// Track and parse the module manifest `file`.
    ///
    /// `None` leaves the current state untouched. A parse failure keeps the previous
    /// manifest but still tracks the new file.
    pub fn update_module_manifest(&self, file: Option<&dyn File>) -> Result<(), TfError> {
        let mut state = self.manifest_write();

        let Some(file) = file else {
            self.logger().scope(|| {
                tracing::debug!(target: "rootmodule", "Ignoring module cache update for {:?} (no manifest file)", self.path);
            });
            return Ok(());
        };

        state.file = Some(TrackedFile::from_file(file));
        let manifest = parse_module_manifest_from_file(file.path())?;
        self.logger().scope(|| {
            tracing::debug!(
                target: "rootmodule",
                "Updated module manifest for {:?} - {} modules",
                self.path,
                manifest.records().len()
            );
        });
        state.manifest = Some(Arc::new(manifest));
        Ok(())
    }

    /// Refresh provider schemas using the plugin lock `file`.
    ///
    /// Fails if executor construction was never attempted or no schema storage
    /// exists. Errors from the refresh itself are logged and not returned.
    pub async fn update_schema_cache(
        &self,
        cancel: &CancellationToken,
        file: Option<&dyn File>,
    ) -> Result<(), TfError> {
        let mut plugin = self.plugin_state.write().await;

        if !self.is_terraform_loaded() {
            return Err(TfError::ExecutorUnavailable);
        }
        let result = self.refresh_schemas(&mut plugin, cancel, file).await;
        self.schema_loaded.store(true, Ordering::SeqCst);
        result
    }

    async fn refresh_schemas(
        &self,
        plugin: &mut PluginState,
        cancel: &CancellationToken,
        file: Option<&dyn File>,
    ) -> Result<(), TfError> {
        let Some(file) = file else {
            self.logger().scope(|| {
                tracing::debug!(target: "rootmodule", "Ignoring schema cache update for {:?} (no plugin lock file)", self.path);
            });
            return Ok(());
        };

        let storage = plugin.schema_storage.clone().ok_or(TfError::SchemaCacheUnavailable)?;
        plugin.lock_file = Some(TrackedFile::from_file(file));
        let executor = plugin.executor.clone().ok_or(TfError::ExecutorUnavailable)?;

        let dir = root_module_dir_from_file_path(file.path());
        if let Err(e) = storage.obtain_schemas_for_module(cancel, &executor, &dir).await {
            self.logger().scope(|| {
                tracing::warn!(target: "rootmodule", "Failed to update schemas for {:?}: {}", dir, e);
            });
        }
        Ok(())
    }

    /// Returns true if `path` is the directory of a local module this root module calls.
    pub fn references_module_path(&self, path: &Path) -> bool {
        let state = self.manifest_read();
        let Some(manifest) = &state.manifest else {
            return false;
        };

        manifest.records().iter().filter(|r| !r.is_root() && !r.is_external()).any(|record| {
            let dir = manifest.record_dir(record);
            self.logger().scope(|| {
                tracing::trace!(target: "rootmodule", "Checking if {:?} equals {:?}", dir, path);
            });
            paths_equal(&dir, path)
        })
    }

    /// Cache files whose changes should trigger a reload.
    pub async fn paths_to_watch(&self) -> Vec<PathBuf> {
        let lock_file = self.plugin_state.read().await.lock_file.clone();
        let manifest_file = self.manifest_read().file.clone();

        lock_file.into_iter().chain(manifest_file).map(|f| f.path().to_path_buf()).collect()
    }

    pub fn is_known_module_manifest_file(&self, path: &Path) -> bool {
        self.manifest_read().file.as_ref().is_some_and(|f| paths_equal(f.path(), path))
    }

    pub async fn is_known_plugin_lock_file(&self, path: &Path) -> bool {
        self.plugin_state.read().await.lock_file.as_ref().is_some_and(|f| paths_equal(f.path(), path))
    }

    async fn discover_terraform_executor(&self) -> Result<(), TfError> {
        let mut plugin = self.plugin_state.write().await;
        let result = self.build_executor();
        self.terraform_loaded.store(true, Ordering::SeqCst);

        plugin.executor = Some(result?);
        Ok(())
    }

    fn build_executor(&self) -> Result<SharedExecutor, TfError> {
        let exec_path = match &self.options.exec_path {
            Some(path) => path.clone(),
            None => (self.options.discovery)()?,
        };

        let mut executor = (self.options.executor_factory)(&exec_path);
        executor.set_workdir(&self.path);
        executor.set_logger(self.logger().clone());
        if let Some(log_path) = &self.options.exec_log_path {
            executor.set_exec_log_path(log_path);
        }
        if let Some(timeout) = self.options.exec_timeout {
            executor.set_timeout(timeout);
        }

        self.logger().scope(|| {
            tracing::debug!(target: "rootmodule", "Terraform executor for {:?} uses {:?}", self.path, exec_path);
        });
        Ok(exec::share(executor))
    }

    async fn discover_terraform_version(&self, cancel: &CancellationToken) -> Result<(), TfError> {
        let mut plugin = self.plugin_state.write().await;
        let Some(executor) = plugin.executor.clone() else {
            self.logger().scope(|| {
                tracing::debug!(target: "rootmodule", "No terraform executor for {:?}, skipping version discovery", self.path);
            });
            return Ok(());
        };

        let version = executor.lock().await.version(cancel).await?;
        self.logger().scope(|| {
            tracing::info!(target: "rootmodule", "Terraform version {} found for {:?}", version, self.path);
        });
        plugin.version = Some(version);
        Ok(())
    }

    async fn find_compatible_schema_storage(&self) -> Result<(), TfError> {
        let mut plugin = self.plugin_state.write().await;
        let Some(version) = plugin.version.clone() else {
            return Ok(());
        };

        let storage = SchemaStorage::for_version(&version)?.with_logger(self.logger().clone());
        self.logger().scope(|| {
            tracing::debug!(
                target: "rootmodule",
                "Using {:?} provider naming for {:?}",
                storage.naming_scheme(),
                self.path
            );
        });
        plugin.schema_storage = Some(Arc::new(storage));
        Ok(())
    }

    async fn find_compatible_lang_parser(&self) -> Result<(), TfError> {
        let mut plugin = self.plugin_state.write().await;
        let result = self.select_parser(&plugin);
        self.parser_loaded.store(true, Ordering::SeqCst);

        if let Some(parser) = result? {
            plugin.parser = Some(parser);
        }
        Ok(())
    }

    fn select_parser(&self, plugin: &PluginState) -> Result<Option<Arc<dyn Parser>>, TfError> {
        let Some(version) = &plugin.version else {
            return Ok(None);
        };

        let mut parser = (self.options.parser_finder)(version)?;
        parser.set_logger(self.logger().clone());
        if let Some(storage) = &plugin.schema_storage {
            parser.set_schema_reader(Arc::clone(storage) as Arc<dyn SchemaReader>);
        }
        Ok(Some(Arc::from(parser)))
    }
}

impl std::fmt::Debug for RootModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootModule")
            .field("path", &self.path)
            .field("is_loading", &self.is_loading)
            .field("terraform_loaded", &self.terraform_loaded)
            .field("parser_loaded", &self.parser_loaded)
            .field("schema_loaded", &self.schema_loaded)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeExecutor, sample_schemas, write_module_manifest, write_plugin_lock_file};
    use tempfile::TempDir;

    fn fake_options(fake: FakeExecutor) -> RootModuleOptions {
        RootModuleOptions::default()
            .with_discovery(Arc::new(|| Ok(PathBuf::from("/fake/terraform"))))
            .with_executor_factory(fake.factory())
    }

    fn failing_discovery() -> RootModuleOptions {
        RootModuleOptions::default().with_discovery(Arc::new(|| {
            Err(TfError::TerraformNotFound {
                reason: "not on PATH".to_string(),
            })
        }))
    }

    async fn initialized_module(fake: FakeExecutor) -> (TempDir, RootModule) {
        let temp = TempDir::new().unwrap();
        write_plugin_lock_file(temp.path());
        write_module_manifest(temp.path(), &[("vpc", "./modules/vpc", "modules/vpc")]);
        let rm = RootModule::new(temp.path(), fake_options(fake));
        rm.discover_caches().await.unwrap();
        (temp, rm)
    }

    #[tokio::test]
    async fn test_fresh_module_state() {
        let rm = RootModule::new("/proj", RootModuleOptions::default());
        assert!(rm.is_loading_done());
        assert!(!rm.is_terraform_loaded());
        assert!(matches!(rm.parser().await, Err(TfError::StageNotLoaded { .. })));
        assert!(matches!(rm.terraform_executor().await, Err(TfError::StageNotLoaded { .. })));
        assert!(rm.load_error().is_none());
        assert!(rm.paths_to_watch().await.is_empty());
    }

    #[tokio::test]
    async fn test_full_load() {
        let fake = FakeExecutor::new("0.13.5").with_schemas(sample_schemas());
        let (_temp, rm) = initialized_module(fake).await;

        rm.load(&CancellationToken::new()).await.unwrap();

        assert!(rm.is_terraform_loaded());
        assert!(rm.is_parser_loaded());
        assert!(rm.is_schema_loaded());
        assert!(rm.is_loading_done());
        assert!(rm.load_error().is_none());
        assert_eq!(rm.terraform_version().await.as_deref(), Some("0.13.5"));

        let parser = rm.parser().await.unwrap();
        assert_eq!(parser.describe_block("resource", "aws_instance").unwrap(), "An EC2 instance");
        assert_eq!(rm.schema_storage().await.unwrap().providers().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_executor_discovery_failure() {
        let rm = RootModule::new("/proj", failing_discovery());
        let err = rm.load(&CancellationToken::new()).await.unwrap_err();

        assert!(rm.is_terraform_loaded());
        assert!(matches!(
            err.stage_error(LoadStage::ExecutorDiscovery),
            Some(TfError::TerraformNotFound { .. })
        ));
        assert_eq!(err.len(), 1);
        assert!(rm.load_error().is_some());
        assert!(matches!(rm.terraform_executor().await, Err(TfError::NoResourceAvailable { .. })));

        // later stages had nothing to work with
        assert!(rm.is_parser_loaded());
        assert!(matches!(rm.parser().await, Err(TfError::NoResourceAvailable { .. })));
        assert!(rm.schema_storage().await.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_version_is_collected_per_stage() {
        let (_temp, rm) = initialized_module(FakeExecutor::new("0.11.14")).await;
        let err = rm.load(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err.stage_error(LoadStage::SchemaStorage), Some(TfError::UnsupportedVersion { .. })));
        assert!(matches!(err.stage_error(LoadStage::Parser), Some(TfError::NoCompatibleParser { .. })));
        assert!(err.stage_error(LoadStage::SchemaRetrieval).is_none());
        assert_eq!(err.len(), 2);

        let text = err.to_string();
        assert!(text.starts_with("2 errors occurred:"), "{text}");
    }

    #[tokio::test]
    async fn test_version_failure_skips_dependent_stages() {
        let fake = FakeExecutor::new("0.13.0").failing_version("exit status 1");
        let version_calls = fake.version_calls();
        let schema_calls = fake.schema_calls();
        let (_temp, rm) = initialized_module(fake).await;
        let err = rm.load(&CancellationToken::new()).await.unwrap_err();

        assert_eq!(version_calls.load(Ordering::SeqCst), 1);
        assert_eq!(schema_calls.load(Ordering::SeqCst), 0);
        assert_eq!(err.len(), 1);
        assert!(matches!(err.stage_error(LoadStage::VersionDiscovery), Some(TfError::VersionQuery { .. })));
        assert!(rm.terraform_executor().await.is_ok());
        assert!(rm.terraform_version().await.is_none());
    }

    #[tokio::test]
    async fn test_failing_schema_retrieval_does_not_fail_load() {
        let fake = FakeExecutor::new("1.5.7").failing_schemas("Error: Inconsistent dependency lock file");
        let (_temp, rm) = initialized_module(fake).await;

        rm.load(&CancellationToken::new()).await.unwrap();
        assert!(rm.is_schema_loaded());
        assert!(!rm.schema_storage().await.unwrap().has_snapshot());
    }

    #[tokio::test]
    async fn test_executor_is_configured_from_options() {
        let fake = FakeExecutor::new("0.13.0");
        let recorded = fake.settings();
        let workdirs = fake.workdirs();
        let options = RootModuleOptions {
            exec_path: Some(PathBuf::from("/opt/terraform")),
            exec_timeout: Some(Duration::from_secs(7)),
            exec_log_path: Some(PathBuf::from("/tmp/tf-exec.log")),
            ..fake_options(fake).with_logger(Logger::from_dispatch(tracing::Dispatch::new(
                tracing_subscriber::registry(),
            )))
        };
        let rm = RootModule::new("/proj", options);
        rm.load(&CancellationToken::new()).await.unwrap();

        let executor = rm.terraform_executor().await.unwrap();
        assert_eq!(executor.lock().await.exec_path(), Path::new("/opt/terraform"));
        let recorded = recorded.lock().unwrap().clone();
        assert_eq!(recorded.timeout, Some(Duration::from_secs(7)));
        assert_eq!(recorded.exec_log_path, Some(PathBuf::from("/tmp/tf-exec.log")));
        assert!(recorded.logger_attached);
        assert_eq!(workdirs.lock().unwrap().first().map(PathBuf::as_path), Some(Path::new("/proj")));
    }

    #[tokio::test]
    async fn test_update_schema_cache_preconditions() {
        let rm = RootModule::new("/proj", fake_options(FakeExecutor::new("0.13.0")));
        let lock = TrackedFile::new("/proj/.terraform.lock.hcl");
        let cancel = CancellationToken::new();

        assert!(matches!(
            rm.update_schema_cache(&cancel, Some(&lock)).await,
            Err(TfError::ExecutorUnavailable)
        ));
        assert!(!rm.is_schema_loaded());

        rm.discover_terraform_executor().await.unwrap();
        assert!(rm.update_schema_cache(&cancel, None).await.is_ok());
        assert!(matches!(
            rm.update_schema_cache(&cancel, Some(&lock)).await,
            Err(TfError::SchemaCacheUnavailable)
        ));
        assert!(rm.is_schema_loaded());
    }

    #[tokio::test]
    async fn test_update_schema_cache_runs_in_lock_file_root() {
        let fake = FakeExecutor::new("0.13.0").with_schemas(sample_schemas());
        let workdirs = fake.workdirs();
        let (temp, rm) = initialized_module(fake).await;
        let cancel = CancellationToken::new();
        rm.load(&cancel).await.unwrap();

        let selections = TrackedFile::new("/elsewhere/.terraform/plugins/selections.json");
        rm.update_schema_cache(&cancel, Some(&selections)).await.unwrap();

        let workdirs = workdirs.lock().unwrap().clone();
        assert_eq!(workdirs.last().map(PathBuf::as_path), Some(Path::new("/elsewhere")));
        assert!(workdirs.contains(&temp.path().to_path_buf()));
        assert!(rm.is_known_plugin_lock_file(selections.path()).await);
    }

    #[tokio::test]
    async fn test_references_module_path() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let manifest = write_module_manifest(
            root,
            &[
                ("vpc", "./modules/vpc", "modules/vpc"),
                ("remote", "terraform-aws-modules/vpc/aws", ".terraform/modules/remote"),
            ],
        );
        let rm = RootModule::new(root, RootModuleOptions::default());
        assert!(!rm.references_module_path(&root.join("modules/vpc")));

        rm.update_module_manifest(Some(&TrackedFile::new(&manifest))).unwrap();
        assert!(rm.references_module_path(&root.join("modules/vpc")));
        assert!(rm.references_module_path(&root.join("modules/./vpc/")));
        assert!(!rm.references_module_path(root));
        assert!(!rm.references_module_path(&root.join(".terraform/modules/remote")));
    }

    #[tokio::test]
    async fn test_known_files_and_paths_to_watch() {
        let (temp, rm) = initialized_module(FakeExecutor::new("0.13.0")).await;
        let lock = temp.path().join(".terraform.lock.hcl");
        let manifest = temp.path().join(".terraform/modules/modules.json");

        assert!(rm.is_known_plugin_lock_file(&lock).await);
        assert!(rm.is_known_module_manifest_file(&manifest));
        assert!(!rm.is_known_module_manifest_file(&lock));

        let watched = rm.paths_to_watch().await;
        assert_eq!(watched, vec![lock, manifest]);
    }

    #[tokio::test]
    async fn test_update_module_manifest_none_is_noop() {
        let rm = RootModule::new("/proj", RootModuleOptions::default());
        rm.update_module_manifest(None).unwrap();
        assert!(rm.module_manifest().is_none());
        assert!(rm.paths_to_watch().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_loading_runs_in_background() {
        let fake = FakeExecutor::new("0.13.0").with_schemas(sample_schemas());
        let (_temp, rm) = initialized_module(fake).await;
        let rm = Arc::new(rm);

        let handle = rm.start_loading();
        handle.await.unwrap().unwrap();
        assert!(rm.is_loading_done());
        assert!(rm.is_schema_loaded());
        assert!(rm.load_error().is_none());
    }

    #[tokio::test]
    async fn test_cancel_loading_aborts_schema_retrieval() {
        let fake = FakeExecutor::new("0.13.0").with_schemas(sample_schemas());
        let gate = fake.gate();
        let calls = fake.schema_calls();
        let (_temp, rm) = initialized_module(fake).await;
        let rm = Arc::new(rm);

        let handle = rm.start_loading();
        assert!(!rm.is_loading_done());
        gate.wait_entered().await;
        rm.cancel_loading();
        assert!(rm.is_loading_done());

        // retrieval errors never reach the load result
        handle.await.unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!rm.schema_storage().await.unwrap().has_snapshot());
    }

    #[test]
    fn test_cancel_without_load_is_harmless() {
        let rm = RootModule::new("/proj", RootModuleOptions::default());
        rm.cancel_loading();
        assert!(rm.is_loading_done());
    }
}
