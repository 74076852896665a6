//! End-to-end root module loading through the library API.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tempfile::TempDir;
use tfroot::config::Settings;
use tfroot::core::{LoadStage, TfError};
use tfroot::manager::{RootModuleManager, candidates_message};
use tfroot::rootmodule::{RootModule, RootModuleOptions};
use tfroot::schema::{NamingScheme, SchemaReader};
use tfroot::test_utils::{
    FakeExecutor, init_test_logging, sample_schemas, write_module_manifest, write_plugin_lock_file,
};
use tokio_util::sync::CancellationToken;

fn options(fake: FakeExecutor) -> RootModuleOptions {
    RootModuleOptions::default()
        .with_discovery(Arc::new(|| Ok(PathBuf::from("/usr/local/bin/terraform"))))
        .with_executor_factory(fake.factory())
}

#[tokio::test]
async fn test_registry_era_module_loads_schemas() {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    write_plugin_lock_file(temp.path());
    write_module_manifest(temp.path(), &[("network", "./modules/network", "modules/network")]);

    let module = Arc::new(RootModule::new(temp.path(), options(FakeExecutor::new("1.5.7").with_schemas(sample_schemas()))));
    module.discover_caches().await.unwrap();
    module.start_loading().await.unwrap().unwrap();

    let storage = module.schema_storage().await.unwrap();
    assert_eq!(storage.naming_scheme(), NamingScheme::Registry);
    let mut providers: Vec<String> = storage.providers().unwrap().iter().map(|p| p.raw_name().to_string()).collect();
    providers.sort();
    assert_eq!(providers, vec!["aws", "null"]);

    let parser = module.parser().await.unwrap();
    assert_eq!(parser.describe_block("provider", "aws").unwrap(), "Amazon Web Services");
    assert!(module.references_module_path(&temp.path().join("modules/network")));
}

#[tokio::test]
async fn test_legacy_module_without_lock_file() {
    let temp = TempDir::new().unwrap();
    let fake = FakeExecutor::new("0.12.31").with_schemas(sample_schemas());
    let calls = fake.schema_calls();

    let module = RootModule::new(temp.path(), options(fake));
    module.discover_caches().await.unwrap();
    module.load(&CancellationToken::new()).await.unwrap();

    assert_eq!(module.schema_storage().await.unwrap().naming_scheme(), NamingScheme::Legacy);
    assert!(module.is_schema_loaded());
    assert_eq!(calls.load(Ordering::SeqCst), 0, "no lock file, no schema retrieval");
    assert!(matches!(
        module.schema_storage().await.unwrap().providers(),
        Err(TfError::NoSchemaAvailable)
    ));
}

#[tokio::test]
async fn test_missing_terraform_is_reported_per_stage() {
    let temp = TempDir::new().unwrap();
    write_plugin_lock_file(temp.path());
    let options = RootModuleOptions::default().with_discovery(Arc::new(|| {
        Err(TfError::TerraformNotFound {
            reason: "cannot find binary \"terraform\" in PATH".to_string(),
        })
    }));

    let module = RootModule::new(temp.path(), options);
    module.discover_caches().await.unwrap();
    let errors = module.load(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(errors.failures().len(), 1);
    assert_eq!(errors.failures()[0].stage, LoadStage::ExecutorDiscovery);
    assert!(module.is_terraform_loaded());
    assert!(matches!(module.terraform_executor().await, Err(TfError::NoResourceAvailable { .. })));
}

#[tokio::test]
async fn test_workspace_candidates() {
    let temp = TempDir::new().unwrap();
    for env in ["dev", "prod"] {
        let dir = temp.path().join("envs").join(env);
        write_plugin_lock_file(&dir);
        write_module_manifest(&dir, &[("app", "../../modules/app", "../../modules/app")]);
    }
    std::fs::create_dir_all(temp.path().join("modules/app")).unwrap();

    let manager = RootModuleManager::with_options(
        Settings::default(),
        options(FakeExecutor::new("1.0.0").with_schemas(sample_schemas())),
    );
    let modules = manager.load_workspace(temp.path(), &CancellationToken::new()).await.unwrap();
    assert_eq!(modules.len(), 2);
    assert!(modules.iter().all(|m| m.load_error().is_none()));

    let candidates: Vec<PathBuf> = manager
        .root_module_candidates_by_path(&temp.path().join("modules/app"))
        .iter()
        .map(|m| m.path().to_path_buf())
        .collect();
    assert_eq!(candidates.len(), 2);

    let message = candidates_message(temp.path(), "main.tf", &candidates).unwrap();
    assert!(message.starts_with("Alternative root modules found for main.tf"));
    assert!(message.ends_with(&format!("picked: {}", PathBuf::from("envs").join("dev").display())));
}
