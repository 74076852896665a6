//! Test utilities shared by unit and integration tests.
//!
//! Available to the crate's own tests and, through the `test-utils` feature, to the
//! integration suites under `tests/`.
//!
//! - [`init_test_logging`] - opt-in tracing output for tests
//! - [`FakeExecutor`] - an in-memory [`Executor`] with scripted results and a
//!   [`Gate`] for holding a schema refresh open
//! - [`sample_schemas`] - a small two-provider schema document
//! - fixture writers for module manifests and plugin lock files

use crate::constants::DEPENDENCY_LOCK_FILE;
use crate::core::TfError;
use crate::exec::{Executor, ExecutorFactory};
use crate::logging::Logger;
use crate::rootmodule::files::module_manifest_file_path;
use crate::schema::document::{ProviderSchema, ProviderSchemas, Schema, SchemaBlock};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging once per process.
///
/// With `Some(level)` that level is used; otherwise `RUST_LOG` decides, and without
/// it nothing is logged.
///
/// ```bash
/// RUST_LOG=rootmodule=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// Holds a [`FakeExecutor`] schema call open until released.
#[derive(Clone, Default)]
pub struct Gate {
    enabled: Arc<AtomicBool>,
    entered: Arc<Notify>,
    released: CancellationToken,
}

impl Gate {
    /// Wait until a schema call is parked at the gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let every parked and future schema call through.
    pub fn release(&self) {
        self.released.cancel();
    }
}

/// Settings a [`FakeExecutor`] received from its owner.
#[derive(Debug, Clone, Default)]
pub struct RecordedSettings {
    pub timeout: Option<Duration>,
    pub exec_log_path: Option<PathBuf>,
    pub logger_attached: bool,
}

/// An [`Executor`] returning scripted results.
///
/// Clones share their call counters and recordings, which lets a test keep a handle
/// after boxing the executor or turning it into a [`FakeExecutor::factory`].
#[derive(Clone)]
pub struct FakeExecutor {
    exec_path: PathBuf,
    version: Result<String, String>,
    schemas: Result<ProviderSchemas, String>,
    workdirs: Arc<Mutex<Vec<PathBuf>>>,
    settings: Arc<Mutex<RecordedSettings>>,
    schema_calls: Arc<AtomicUsize>,
    version_calls: Arc<AtomicUsize>,
    gate: Gate,
}

impl FakeExecutor {
    /// An executor reporting `version` and an empty schema document.
    pub fn new(version: &str) -> Self {
        Self {
            exec_path: PathBuf::from("/fake/terraform"),
            version: Ok(version.to_string()),
            schemas: Ok(ProviderSchemas::default()),
            workdirs: Arc::default(),
            settings: Arc::default(),
            schema_calls: Arc::default(),
            version_calls: Arc::default(),
            gate: Gate::default(),
        }
    }

    /// Return `schemas` from every schema call.
    #[must_use]
    pub fn with_schemas(mut self, schemas: ProviderSchemas) -> Self {
        self.schemas = Ok(schemas);
        self
    }

    /// Fail every schema call with `stderr`.
    #[must_use]
    pub fn failing_schemas(mut self, stderr: &str) -> Self {
        self.schemas = Err(stderr.to_string());
        self
    }

    /// Fail every version call with `reason`.
    #[must_use]
    pub fn failing_version(mut self, reason: &str) -> Self {
        self.version = Err(reason.to_string());
        self
    }

    /// Enable the gate and return a handle to it.
    pub fn gate(&self) -> Gate {
        self.gate.enabled.store(true, Ordering::SeqCst);
        self.gate.clone()
    }

    /// Every working directory set so far, oldest first.
    pub fn workdirs(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        Arc::clone(&self.workdirs)
    }

    /// Timeout, exec log path and logger state received so far.
    pub fn settings(&self) -> Arc<Mutex<RecordedSettings>> {
        Arc::clone(&self.settings)
    }

    /// Number of schema calls made.
    pub fn schema_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.schema_calls)
    }

    /// Number of version calls made.
    pub fn version_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.version_calls)
    }

    /// A factory handing out clones of this executor bound to the requested path.
    pub fn factory(self) -> ExecutorFactory {
        Arc::new(move |path: &Path| {
            let mut executor = self.clone();
            executor.exec_path = path.to_path_buf();
            Box::new(executor) as Box<dyn Executor>
        })
    }

    fn record(&self, f: impl FnOnce(&mut RecordedSettings)) {
        if let Ok(mut settings) = self.settings.lock() {
            f(&mut settings);
        }
    }
}

#[async_trait::async_trait]
impl Executor for FakeExecutor {
    fn set_workdir(&mut self, dir: &Path) {
        if let Ok(mut workdirs) = self.workdirs.lock() {
            workdirs.push(dir.to_path_buf());
        }
    }

    fn set_logger(&mut self, logger: Logger) {
        self.record(|s| s.logger_attached = !logger.is_discard());
    }

    fn set_exec_log_path(&mut self, path: &Path) {
        self.record(|s| s.exec_log_path = Some(path.to_path_buf()));
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.record(|s| s.timeout = Some(timeout));
    }

    async fn version(&self, cancel: &CancellationToken) -> Result<String, TfError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(TfError::Cancelled {
                operation: "version".to_string(),
            });
        }
        self.version.clone().map_err(|reason| TfError::VersionQuery {
            reason,
        })
    }

    async fn provider_schemas(&self, cancel: &CancellationToken) -> Result<ProviderSchemas, TfError> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);

        if self.gate.enabled.load(Ordering::SeqCst) {
            self.gate.entered.notify_one();
            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(TfError::Cancelled {
                        operation: "providers schema".to_string(),
                    });
                }
                () = self.gate.released.cancelled() => {}
            }
        }

        self.schemas.clone().map_err(|stderr| TfError::CommandFailed {
            operation: "providers schema".to_string(),
            stderr,
        })
    }

    fn exec_path(&self) -> &Path {
        &self.exec_path
    }
}

fn schema_with_description(description: &str) -> Schema {
    Schema {
        version: 0,
        block: SchemaBlock {
            description: description.to_string(),
            ..Default::default()
        },
    }
}

/// Two providers, `aws` and `null`, both declaring a `shared_thing` resource.
///
/// `aws` has a configuration block described as "Amazon Web Services"; `null` has
/// none.
pub fn sample_schemas() -> ProviderSchemas {
    let aws = ProviderSchema {
        config_schema: Some(schema_with_description("Amazon Web Services")),
        resource_schemas: BTreeMap::from([
            ("aws_instance".to_string(), schema_with_description("An EC2 instance")),
            ("shared_thing".to_string(), schema_with_description("aws flavour")),
        ]),
        data_source_schemas: BTreeMap::from([(
            "aws_ami".to_string(),
            schema_with_description("An AMI"),
        )]),
    };
    let null = ProviderSchema {
        config_schema: None,
        resource_schemas: BTreeMap::from([
            ("null_resource".to_string(), schema_with_description("Does nothing")),
            ("shared_thing".to_string(), schema_with_description("null flavour")),
        ]),
        data_source_schemas: BTreeMap::from([(
            "null_data_source".to_string(),
            schema_with_description("Echoes its inputs"),
        )]),
    };

    ProviderSchemas {
        format_version: "0.1".to_string(),
        provider_schemas: BTreeMap::from([
            ("registry.terraform.io/hashicorp/aws".to_string(), aws),
            ("registry.terraform.io/hashicorp/null".to_string(), null),
        ]),
    }
}

/// Write `.terraform/modules/modules.json` under `dir`.
///
/// Each record is `(key, source, dir)`; the manifest always starts with the root
/// record.
pub fn write_module_manifest(dir: &Path, records: &[(&str, &str, &str)]) -> PathBuf {
    let mut modules = vec![serde_json::json!({"Key": "", "Source": "", "Dir": "."})];
    for (key, source, module_dir) in records {
        modules.push(serde_json::json!({"Key": key, "Source": source, "Dir": module_dir}));
    }
    let path = module_manifest_file_path(dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create modules dir");
    }
    std::fs::write(&path, serde_json::json!({"Modules": modules}).to_string())
        .expect("write module manifest");
    path
}

/// Write an empty `.terraform.lock.hcl` under `dir`.
pub fn write_plugin_lock_file(dir: &Path) -> PathBuf {
    let path = dir.join(DEPENDENCY_LOCK_FILE);
    std::fs::create_dir_all(dir).expect("create root module dir");
    std::fs::write(&path, "# generated by terraform init\n").expect("write lock file");
    path
}
