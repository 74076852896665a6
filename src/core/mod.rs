//! Core types shared across tfroot
//!
//! This module holds the error vocabulary used by every other module:
//! - [`TfError`] - Enumerated error types for all failure modes
//! - [`LoadError`] / [`LoadStage`] - Aggregated result of the loading pipeline
//! - [`ErrorContext`] - User-friendly wrapper with suggestions for the CLI
//! - [`user_friendly_error`] - Convert any error to a user-friendly format

pub mod error;

pub use error::{
    ErrorContext, LoadError, LoadStage, StageFailure, TfError, user_friendly_error,
};
