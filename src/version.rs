//! Tool version parsing.
//!
//! Terraform reports versions such as `0.12.29`, `v0.13.0-beta1` or, from some
//! wrappers, just `0.12`. [`parse_version`] accepts all of these and yields a
//! [`semver::Version`] so the rest of the crate can compare against the thresholds in
//! [`crate::constants`].

use crate::core::TfError;
use semver::Version;

/// Parse a version string leniently.
///
/// A leading `v` is ignored and missing minor or patch components are treated as
/// zero. Pre-release and build suffixes are kept, so `0.13.0-beta1` sorts before
/// `0.13.0`.
///
/// # Examples
///
/// ```rust
/// use tfroot::version::parse_version;
///
/// assert_eq!(parse_version("v0.12").unwrap(), semver::Version::new(0, 12, 0));
/// assert!(parse_version("0.13.0-beta1").unwrap() < semver::Version::new(0, 13, 0));
/// ```
pub fn parse_version(input: &str) -> Result<Version, TfError> {
    let invalid = |reason: &str| TfError::InvalidVersion {
        version: input.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(invalid("empty version string"));
    }

    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);

    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(invalid("expected MAJOR[.MINOR[.PATCH]]"));
    }
    while parts.len() < 3 {
        parts.push("0");
    }

    let normalized = format!("{}{suffix}", parts.join("."));
    Version::parse(&normalized).map_err(|e| invalid(&e.to_string()))
}
