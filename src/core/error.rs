//! Error handling for tfroot
//!
//! This module provides the error types shared by the root-module orchestrator, the
//! schema cache and the executor, plus user-friendly error reporting for the CLI.
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`TfError`]) so callers can match on the precise failure
//! 2. **User-friendly messages** ([`ErrorContext`]) with actionable suggestions
//!
//! # Error Categories
//!
//! - **Tool discovery**: [`TfError::TerraformNotFound`], [`TfError::VersionQuery`],
//!   [`TfError::InvalidVersion`], [`TfError::UnsupportedVersion`]
//! - **Caches on disk**: [`TfError::ManifestParse`]
//! - **Schema cache**: [`TfError::SchemaUnavailable`], [`TfError::SchemaBusy`],
//!   [`TfError::NoSchemaAvailable`], [`TfError::SchemaCacheUnavailable`]
//! - **Lifecycle**: [`TfError::StageNotLoaded`], [`TfError::NoResourceAvailable`],
//!   [`TfError::ExecutorUnavailable`]
//! - **Process execution**: [`TfError::CommandFailed`], [`TfError::Timeout`],
//!   [`TfError::Cancelled`], [`TfError::InvalidOutput`]
//!
//! The loading pipeline does not stop at the first failure. Every stage error is
//! collected into a [`LoadError`] together with the [`LoadStage`] that produced it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tfroot::core::{TfError, user_friendly_error};
//!
//! let err = anyhow::Error::from(TfError::SchemaBusy);
//! let ctx = user_friendly_error(err);
//! ctx.display(); // Shows colored error with suggestions
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for tfroot operations.
///
/// Variants carry owned strings rather than borrowed data so errors can be stored
/// on a root module (see [`LoadError`]) and handed out to later callers.
#[derive(Error, Debug)]
pub enum TfError {
    /// No terraform executable could be located.
    #[error("Terraform executable not found: {reason}")]
    TerraformNotFound {
        /// Why discovery failed
        reason: String,
    },

    /// `terraform version` could not be run or understood.
    #[error("Failed to obtain Terraform version: {reason}")]
    VersionQuery {
        /// Description of the failure
        reason: String,
    },

    /// A version string is not a valid semantic version.
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion {
        /// The offending version string
        version: String,
        /// Parser message
        reason: String,
    },

    /// The discovered tool version is older than the minimum supported one.
    #[error("No schema storage available for terraform {version}")]
    UnsupportedVersion {
        /// The unsupported version
        version: String,
    },

    /// No language parser is compatible with the discovered version.
    #[error("No compatible parser found for terraform {version}")]
    NoCompatibleParser {
        /// The version no parser accepts
        version: String,
    },

    /// The module manifest file could not be parsed.
    #[error("Failed to parse module manifest {file}: {reason}")]
    ManifestParse {
        /// Path of the manifest file
        file: String,
        /// Parser message
        reason: String,
    },

    /// The requested schema is not part of the current snapshot.
    #[error("No {kind} schema available for {name}")]
    SchemaUnavailable {
        /// Kind of schema ("provider", "resource" or "data")
        kind: String,
        /// Name that was looked up
        name: String,
    },

    /// A schema refresh holds the exclusion slot.
    #[error("Schema temporarily unavailable")]
    SchemaBusy,

    /// No snapshot has ever been stored.
    #[error("No schema available")]
    NoSchemaAvailable,

    /// A lifecycle query was issued before its stage was attempted.
    #[error("{what} is not loaded yet")]
    StageNotLoaded {
        /// The component queried, e.g. "parser"
        what: String,
    },

    /// The stage was attempted but produced nothing.
    #[error("No {what} available")]
    NoResourceAvailable {
        /// The component queried, e.g. "parser"
        what: String,
    },

    /// Schema refresh requested before the executor stage ran.
    #[error("Cannot update schema as terraform executor is not available yet")]
    ExecutorUnavailable,

    /// Schema refresh requested without a schema storage.
    #[error("Cannot update schema as schema cache is not available")]
    SchemaCacheUnavailable,

    /// The external tool exited unsuccessfully.
    #[error("Terraform {operation} failed: {stderr}")]
    CommandFailed {
        /// Sub-command that failed, e.g. "version"
        operation: String,
        /// Captured standard error
        stderr: String,
    },

    /// The external tool did not finish in time.
    #[error("Terraform {operation} timed out after {seconds} seconds")]
    Timeout {
        /// Sub-command that timed out
        operation: String,
        /// Configured timeout
        seconds: u64,
    },

    /// The invocation was aborted through its cancellation token.
    #[error("Terraform {operation} was cancelled")]
    Cancelled {
        /// Sub-command that was aborted
        operation: String,
    },

    /// The tool produced output that could not be decoded.
    #[error("Unexpected output from terraform {operation}: {reason}")]
    InvalidOutput {
        /// Sub-command whose output was rejected
        operation: String,
        /// Decoder message
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl TfError {
    /// Shorthand for [`TfError::StageNotLoaded`].
    pub fn not_loaded(what: impl Into<String>) -> Self {
        Self::StageNotLoaded {
            what: what.into(),
        }
    }

    /// Shorthand for [`TfError::NoResourceAvailable`].
    pub fn not_available(what: impl Into<String>) -> Self {
        Self::NoResourceAvailable {
            what: what.into(),
        }
    }

    /// Returns true for the fail-fast condition raised while a refresh is running.
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::SchemaBusy)
    }
}

impl Clone for TfError {
    fn clone(&self) -> Self {
        match self {
            Self::TerraformNotFound {
                reason,
            } => Self::TerraformNotFound {
                reason: reason.clone(),
            },
            Self::VersionQuery {
                reason,
            } => Self::VersionQuery {
                reason: reason.clone(),
            },
            Self::InvalidVersion {
                version,
                reason,
            } => Self::InvalidVersion {
                version: version.clone(),
                reason: reason.clone(),
            },
            Self::UnsupportedVersion {
                version,
            } => Self::UnsupportedVersion {
                version: version.clone(),
            },
            Self::NoCompatibleParser {
                version,
            } => Self::NoCompatibleParser {
                version: version.clone(),
            },
            Self::ManifestParse {
                file,
                reason,
            } => Self::ManifestParse {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::SchemaUnavailable {
                kind,
                name,
            } => Self::SchemaUnavailable {
                kind: kind.clone(),
                name: name.clone(),
            },
            Self::SchemaBusy => Self::SchemaBusy,
            Self::NoSchemaAvailable => Self::NoSchemaAvailable,
            Self::StageNotLoaded {
                what,
            } => Self::StageNotLoaded {
                what: what.clone(),
            },
            Self::NoResourceAvailable {
                what,
            } => Self::NoResourceAvailable {
                what: what.clone(),
            },
            Self::ExecutorUnavailable => Self::ExecutorUnavailable,
            Self::SchemaCacheUnavailable => Self::SchemaCacheUnavailable,
            Self::CommandFailed {
                operation,
                stderr,
            } => Self::CommandFailed {
                operation: operation.clone(),
                stderr: stderr.clone(),
            },
            Self::Timeout {
                operation,
                seconds,
            } => Self::Timeout {
                operation: operation.clone(),
                seconds: *seconds,
            },
            Self::Cancelled {
                operation,
            } => Self::Cancelled {
                operation: operation.clone(),
            },
            Self::InvalidOutput {
                operation,
                reason,
            } => Self::InvalidOutput {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            // io::Error is not Clone; keep kind and message
            Self::IoError(e) => Self::IoError(std::io::Error::new(e.kind(), e.to_string())),
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// The stages of the root-module loading pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStage {
    /// Parse the module manifest discovered on disk
    ModuleManifest,
    /// Locate and configure the terraform executor
    ExecutorDiscovery,
    /// Ask the executor for its version
    VersionDiscovery,
    /// Pick a schema storage for the version
    SchemaStorage,
    /// Pick a language parser for the version
    Parser,
    /// Retrieve provider schemas into storage
    SchemaRetrieval,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ModuleManifest => "module manifest",
            Self::ExecutorDiscovery => "executor discovery",
            Self::VersionDiscovery => "version discovery",
            Self::SchemaStorage => "schema storage",
            Self::Parser => "parser",
            Self::SchemaRetrieval => "schema retrieval",
        };
        f.write_str(name)
    }
}

/// A single failed pipeline stage.
#[derive(Debug, Clone)]
pub struct StageFailure {
    /// Stage that failed
    pub stage: LoadStage,
    /// What went wrong
    pub error: TfError,
}

/// Aggregated result of a loading pipeline run.
///
/// Every failing stage contributes one [`StageFailure`], in pipeline order.
/// An empty `LoadError` is never returned; see [`LoadError::into_result`].
#[derive(Debug, Clone, Default)]
pub struct LoadError {
    failures: Vec<StageFailure>,
}

impl LoadError {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `result` under `stage` if it is an error.
    pub fn record(&mut self, stage: LoadStage, result: Result<(), TfError>) {
        if let Err(error) = result {
            self.failures.push(StageFailure {
                stage,
                error,
            });
        }
    }

    /// The recorded failures in pipeline order.
    pub fn failures(&self) -> &[StageFailure] {
        &self.failures
    }

    /// The error recorded for `stage`, if any.
    pub fn stage_error(&self, stage: LoadStage) -> Option<&TfError> {
        self.failures.iter().find(|f| f.stage == stage).map(|f| &f.error)
    }

    /// Returns true when no stage failed.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of failed stages.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// `Ok(())` when nothing failed, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failures.as_slice() {
            [] => f.write_str("no errors"),
            [single] => write!(f, "{}: {}", single.stage, single.error),
            failures => {
                write!(f, "{} errors occurred:", failures.len())?;
                for failure in failures {
                    write!(f, "\n\t* {}: {}", failure.stage, failure.error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// Error with user-friendly context for CLI display
///
/// Wraps a [`TfError`] with an optional suggestion and optional details. The CLI
/// entry point converts every failure into an `ErrorContext` before printing it.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: TfError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub const fn new(error: TfError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    ///
    /// - Error message: red and bold
    /// - Details: yellow
    /// - Suggestion: green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
///
/// Recognised errors are [`TfError`], [`LoadError`], [`std::io::Error`] and
/// [`toml::de::Error`]. Anything else keeps its message with a generic hint.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(tf_error) = error.downcast_ref::<TfError>() {
        return create_error_context(tf_error.clone());
    }

    if let Some(load_error) = error.downcast_ref::<LoadError>() {
        return ErrorContext::new(TfError::Other {
            message: load_error.to_string(),
        })
        .with_suggestion("Run with --verbose to see each loading stage")
        .with_details(
            "Stages run independently, so the module may still be partially usable",
        );
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(TfError::IoError(std::io::Error::new(
                    io_error.kind(),
                    format!("{error:#}"),
                )))
                .with_suggestion("Check the permissions of the module directory and its .terraform folder");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(TfError::IoError(std::io::Error::new(
                    io_error.kind(),
                    format!("{error:#}"),
                )))
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(TfError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of your tfroot configuration file");
    }

    ErrorContext::new(TfError::Other {
        message: format!("{error:#}"),
    })
    .with_suggestion("Run with --verbose for more information")
}

fn create_error_context(error: TfError) -> ErrorContext {
    match &error {
        TfError::TerraformNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Install terraform and make sure it is on your PATH, or set terraform_exec_path in the configuration")
            .with_details("The executor is required to discover the version and to retrieve provider schemas"),
        TfError::UnsupportedVersion {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Upgrade terraform to 0.12.0 or newer")
            .with_details("Provider schemas can only be obtained from terraform 0.12 and later"),
        TfError::SchemaBusy => ErrorContext::new(error)
            .with_suggestion("Retry once the schema refresh has finished"),
        TfError::NoSchemaAvailable => ErrorContext::new(error)
            .with_suggestion("Run 'terraform init' in the root module so a plugin lock file exists"),
        TfError::ManifestParse {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Re-run 'terraform init' to regenerate .terraform/modules/modules.json"),
        TfError::Timeout {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Increase terraform_exec_timeout_secs in the configuration"),
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_records_only_failures() {
        let mut errs = LoadError::new();
        errs.record(LoadStage::ModuleManifest, Ok(()));
        errs.record(
            LoadStage::ExecutorDiscovery,
            Err(TfError::TerraformNotFound {
                reason: "not on PATH".to_string(),
            }),
        );
        errs.record(LoadStage::VersionDiscovery, Ok(()));

        assert_eq!(errs.len(), 1);
        assert!(errs.stage_error(LoadStage::ExecutorDiscovery).is_some());
        assert!(errs.stage_error(LoadStage::ModuleManifest).is_none());
        assert!(errs.clone().into_result().is_err());
    }

    #[test]
    fn test_empty_load_error_is_ok() {
        assert!(LoadError::new().into_result().is_ok());
    }

    #[test]
    fn test_load_error_display_lists_stages() {
        let mut errs = LoadError::new();
        errs.record(LoadStage::ExecutorDiscovery, Err(TfError::not_available("binary")));
        errs.record(
            LoadStage::SchemaStorage,
            Err(TfError::UnsupportedVersion {
                version: "0.11.14".to_string(),
            }),
        );

        let msg = errs.to_string();
        assert!(msg.starts_with("2 errors occurred:"));
        assert!(msg.contains("executor discovery: No binary available"));
        assert!(msg.contains("schema storage: No schema storage available for terraform 0.11.14"));
    }

    #[test]
    fn test_lifecycle_messages() {
        assert_eq!(TfError::not_loaded("parser").to_string(), "parser is not loaded yet");
        assert_eq!(TfError::not_available("parser").to_string(), "No parser available");
    }

    #[test]
    fn test_clone_preserves_io_kind() {
        let err = TfError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        match err.clone() {
            TfError::IoError(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_user_friendly_error_for_busy_schema() {
        let ctx = user_friendly_error(anyhow::Error::from(TfError::SchemaBusy));
        assert!(ctx.error.is_busy());
        assert!(ctx.suggestion.is_some());
    }

    #[test]
    fn test_user_friendly_error_display_includes_suggestion() {
        let ctx = ErrorContext::new(TfError::NoSchemaAvailable).with_suggestion("run init");
        let rendered = ctx.to_string();
        assert!(rendered.contains("No schema available"));
        assert!(rendered.contains("Suggestion: run init"));
    }
}
