//! The `tfroot` binary against a scripted terraform stand-in.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn tfroot() -> Command {
    let mut cmd = Command::cargo_bin("tfroot").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("TFROOT_CONFIG")
        .env_remove("TFROOT_TERRAFORM_PATH")
        .env_remove("TFROOT_TERRAFORM_TIMEOUT");
    cmd
}

#[cfg(unix)]
mod scripted {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tfroot::test_utils::{write_module_manifest, write_plugin_lock_file};

    const FAKE_TERRAFORM: &str = r#"#!/bin/sh
if [ "$1" = "version" ]; then
  echo "Terraform v1.5.7"
  echo "on linux_amd64"
  exit 0
fi
if [ "$1" = "providers" ]; then
  cat <<'EOF'
{"format_version":"1.0","provider_schemas":{"registry.terraform.io/hashicorp/null":{"provider":{"version":0,"block":{}},"resource_schemas":{"null_resource":{"version":0,"block":{"description":"A resource that does nothing"}}}}}}
EOF
  exit 0
fi
echo "unexpected arguments: $*" >&2
exit 1
"#;

    struct Workspace {
        temp: TempDir,
        config: PathBuf,
    }

    impl Workspace {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let bin = temp.path().join("bin");
            std::fs::create_dir_all(&bin).unwrap();
            let terraform = bin.join("terraform");
            std::fs::write(&terraform, FAKE_TERRAFORM).unwrap();
            std::fs::set_permissions(&terraform, std::fs::Permissions::from_mode(0o755)).unwrap();

            let config = temp.path().join("config.toml");
            std::fs::write(
                &config,
                format!("terraform_exec_path = \"{}\"\nexclude_dirs = [\"bin\"]\n", terraform.display()),
            )
            .unwrap();

            let project = temp.path().join("project");
            write_plugin_lock_file(&project);
            write_module_manifest(&project, &[("lambda", "./modules/lambda", "modules/lambda")]);
            std::fs::create_dir_all(project.join("modules/lambda")).unwrap();
            std::fs::write(project.join("modules/lambda/main.tf"), "").unwrap();

            Self {
                temp,
                config,
            }
        }

        fn project(&self) -> PathBuf {
            self.temp.path().join("project")
        }

        fn root(&self) -> &Path {
            self.temp.path()
        }
    }

    #[test]
    fn test_list_reports_loaded_module() {
        let ws = Workspace::new();
        tfroot()
            .arg("--config")
            .arg(&ws.config)
            .arg("list")
            .arg(ws.root())
            .assert()
            .success()
            .stdout(predicate::str::contains("project"))
            .stdout(predicate::str::contains("terraform 1.5.7"))
            .stdout(predicate::str::contains("null (1 resources, 0 data sources)"));
    }

    #[test]
    fn test_list_json() {
        let ws = Workspace::new();
        let output = tfroot()
            .arg("--config")
            .arg(&ws.config)
            .args(["list", "--format", "json"])
            .arg(ws.root())
            .output()
            .unwrap();
        assert!(output.status.success());

        let summaries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let first = &summaries[0];
        assert_eq!(first["path"], "project");
        assert_eq!(first["terraform_version"], "1.5.7");
        assert_eq!(first["providers"][0], "null");
        assert_eq!(first["local_modules"][0], "project/modules/lambda");
    }

    #[test]
    fn test_inspect_describes_resource() {
        let ws = Workspace::new();
        tfroot()
            .arg("--config")
            .arg(&ws.config)
            .arg("inspect")
            .arg(ws.project())
            .args(["--resource", "null_resource"])
            .assert()
            .success()
            .stdout(predicate::str::contains("registry.terraform.io/hashicorp/null"))
            .stdout(predicate::str::contains("A resource that does nothing"));
    }

    #[test]
    fn test_candidates_for_local_module_file() {
        let ws = Workspace::new();
        tfroot()
            .arg("--config")
            .arg(&ws.config)
            .arg("candidates")
            .arg(ws.project().join("modules/lambda/main.tf"))
            .arg("--workspace")
            .arg(ws.root())
            .assert()
            .success()
            .stdout(predicate::str::contains("project"))
            .stdout(predicate::str::contains("No root module found").not());
    }
}

#[test]
fn test_invalid_format_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.toml");
    std::fs::write(&config, "").unwrap();

    tfroot()
        .arg("--config")
        .arg(&config)
        .args(["list", "--format", "yaml"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid format 'yaml'"));
}

#[test]
fn test_missing_config_file_fails() {
    let temp = TempDir::new().unwrap();
    tfroot()
        .arg("--config")
        .arg(temp.path().join("missing.toml"))
        .arg("list")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read settings"));
}

#[test]
fn test_empty_workspace() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.toml");
    std::fs::write(&config, "").unwrap();

    tfroot()
        .arg("--config")
        .arg(&config)
        .arg("list")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No root modules found"));
}
