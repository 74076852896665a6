//! Executor backed by the terraform command-line tool.
//!
//! Each invocation is raced against the configured timeout and the caller's
//! cancellation token. The child is spawned with `kill_on_drop`, so losing either
//! race terminates the process instead of leaving it running in the background.

use super::{Executor, ExecutorFactory};
use crate::constants::DEFAULT_EXEC_TIMEOUT;
use crate::core::TfError;
use crate::logging::Logger;
use crate::schema::ProviderSchemas;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

static VERSION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Terraform v(\S+)").expect("version pattern is valid")
});

/// Runs `terraform` sub-commands for a single working directory.
#[derive(Debug, Clone)]
pub struct TerraformExecutor {
    exec_path: PathBuf,
    workdir: Option<PathBuf>,
    timeout: Duration,
    exec_log_path: Option<PathBuf>,
    logger: Logger,
}

impl TerraformExecutor {
    /// Create an executor for the binary at `exec_path`.
    ///
    /// Defaults: no working directory (the process directory is used), a timeout of
    /// [`DEFAULT_EXEC_TIMEOUT`], no exec log, and a discarding logger.
    pub fn new(exec_path: impl Into<PathBuf>) -> Self {
        Self {
            exec_path: exec_path.into(),
            workdir: None,
            timeout: DEFAULT_EXEC_TIMEOUT,
            exec_log_path: None,
            logger: Logger::discard(),
        }
    }

    /// An [`ExecutorFactory`] producing `TerraformExecutor`s.
    pub fn factory() -> ExecutorFactory {
        Arc::new(|path: &Path| Box::new(Self::new(path)) as Box<dyn Executor>)
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        args: &[&str],
    ) -> Result<Output, TfError> {
        let start = Instant::now();
        let mut cmd = Command::new(&self.exec_path);
        cmd.args(args)
            .env("TF_IN_AUTOMATION", "1")
            .env("CHECKPOINT_DISABLE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let command_line = format!("{} {}", self.exec_path.display(), args.join(" "));
        self.logger.scope(|| {
            tracing::debug!(
                target: "exec",
                "Executing command: {} (workdir: {:?})",
                command_line,
                self.workdir
            );
        });

        let output = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.logger.scope(|| {
                    tracing::warn!(target: "exec", "Command cancelled: {}", command_line);
                });
                return Err(TfError::Cancelled {
                    operation: operation.to_string(),
                });
            }
            result = timeout(self.timeout, cmd.output()) => match result {
                Ok(Ok(output)) => output,
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(TfError::TerraformNotFound {
                        reason: format!("{}: {e}", self.exec_path.display()),
                    });
                }
                Ok(Err(e)) => return Err(TfError::IoError(e)),
                Err(_) => {
                    self.logger.scope(|| {
                        tracing::warn!(
                            target: "exec",
                            "Command timed out after {} seconds: {}",
                            self.timeout.as_secs(),
                            command_line
                        );
                    });
                    return Err(TfError::Timeout {
                        operation: operation.to_string(),
                        seconds: self.timeout.as_secs(),
                    });
                }
            },
        };

        let elapsed = start.elapsed();
        self.append_exec_log(&command_line, &output, elapsed).await;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            self.logger.scope(|| {
                tracing::debug!(
                    target: "exec",
                    "Command failed with exit code: {:?}",
                    output.status.code()
                );
            });
            return Err(TfError::CommandFailed {
                operation: operation.to_string(),
                stderr,
            });
        }

        self.logger.scope(|| {
            if elapsed.as_secs() > 1 {
                tracing::info!(target: "exec::perf", "terraform {} took {:.2}s", operation, elapsed.as_secs_f64());
            } else {
                tracing::debug!(target: "exec::perf", "terraform {} took {}ms", operation, elapsed.as_millis());
            }
        });

        Ok(output)
    }

    async fn append_exec_log(&self, command_line: &str, output: &Output, elapsed: Duration) {
        let Some(path) = &self.exec_log_path else {
            return;
        };

        let mut entry = format!(
            "[{}] {} (exit {:?}, {}ms)\n",
            chrono::Utc::now().to_rfc3339(),
            command_line,
            output.status.code(),
            elapsed.as_millis()
        );
        entry.push_str(&String::from_utf8_lossy(&output.stdout));
        entry.push_str(&String::from_utf8_lossy(&output.stderr));
        if !entry.ends_with('\n') {
            entry.push('\n');
        }

        let result = async {
            let mut file =
                tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
            file.write_all(entry.as_bytes()).await
        }
        .await;

        if let Err(e) = result {
            self.logger.scope(|| {
                tracing::warn!(target: "exec", "Failed to write exec log {}: {}", path.display(), e);
            });
        }
    }
}

/// Extract the version from `terraform version` output.
///
/// Only the first `Terraform vX.Y.Z` line counts; provider lines that follow it
/// are ignored.
pub fn parse_version_output(stdout: &str) -> Option<String> {
    VERSION_LINE.captures(stdout).map(|c| c[1].to_string())
}

#[async_trait]
impl Executor for TerraformExecutor {
    fn set_workdir(&mut self, dir: &Path) {
        self.workdir = Some(dir.to_path_buf());
    }

    fn set_logger(&mut self, logger: Logger) {
        self.logger = logger;
    }

    fn set_exec_log_path(&mut self, path: &Path) {
        self.exec_log_path = Some(path.to_path_buf());
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    async fn version(&self, cancel: &CancellationToken) -> Result<String, TfError> {
        let output = self.run(cancel, "version", &["version"]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_version_output(&stdout).ok_or_else(|| TfError::VersionQuery {
            reason: format!("unrecognised output: {}", stdout.lines().next().unwrap_or_default()),
        })
    }

    async fn provider_schemas(&self, cancel: &CancellationToken) -> Result<ProviderSchemas, TfError> {
        let output = self.run(cancel, "providers schema", &["providers", "schema", "-json"]).await?;
        ProviderSchemas::from_json(&output.stdout).map_err(|e| TfError::InvalidOutput {
            operation: "providers schema".to_string(),
            reason: e.to_string(),
        })
    }

    fn exec_path(&self) -> &Path {
        &self.exec_path
    }
}
