//! Global constants used throughout the tfroot codebase.
//!
//! Version thresholds, well-known file locations and timeouts live here so that
//! the few places branching on them stay discoverable.

use std::time::Duration;

/// Registry prefix prepended to raw provider names from terraform 0.13 on.
pub const DEFAULT_PROVIDER_NAMESPACE: &str = "registry.terraform.io/hashicorp/";

/// First version whose provider schemas use registry-qualified names.
pub const REGISTRY_NAMING_VERSION: semver::Version = semver::Version::new(0, 13, 0);

/// Oldest version able to produce provider schemas.
pub const MIN_SUPPORTED_VERSION: semver::Version = semver::Version::new(0, 12, 0);

/// Name of the per-module data directory created by `terraform init`.
pub const DATA_DIR: &str = ".terraform";

/// Dependency lock file written by terraform 0.14 and later.
pub const DEPENDENCY_LOCK_FILE: &str = ".terraform.lock.hcl";

/// Binary looked up on `PATH` when no explicit executable is configured.
pub const TERRAFORM_BINARY: &str = "terraform";

/// Default timeout for a single terraform invocation (30 seconds).
///
/// Schema retrieval starts every provider plugin, which can take a while on
/// modules with many providers.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable pointing at an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "TFROOT_CONFIG";

/// Environment variable overriding the terraform executable path.
pub const TERRAFORM_PATH_ENV: &str = "TFROOT_TERRAFORM_PATH";

/// Environment variable overriding the terraform timeout, in seconds.
pub const TERRAFORM_TIMEOUT_ENV: &str = "TFROOT_TERRAFORM_TIMEOUT";
