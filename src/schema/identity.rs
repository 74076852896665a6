//! Provider identities and the naming schemes that translate them.
//!
//! Terraform 0.13 moved providers into a registry namespace: what used to be called
//! `aws` is reported as `registry.terraform.io/hashicorp/aws` by
//! `terraform providers schema -json`. The [`NamingScheme`] is picked once per
//! [`SchemaStorage`](super::SchemaStorage) from the tool version and never changes
//! afterwards.

use crate::constants::DEFAULT_PROVIDER_NAMESPACE;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Translation between short ("raw") and registry-qualified provider names.
pub trait IdentityConverter {
    /// Translate a qualified name back to its raw form.
    fn qualified_to_raw(&self, name: &str) -> String;

    /// Translate a raw name to its qualified form.
    fn raw_to_qualified(&self, name: &str) -> String;
}

/// The two provider naming eras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamingScheme {
    /// Terraform 0.12: raw and qualified names are the same string.
    Legacy,
    /// Terraform 0.13 and later: names live under the default registry namespace.
    Registry,
}

impl IdentityConverter for NamingScheme {
    fn qualified_to_raw(&self, name: &str) -> String {
        match self {
            Self::Legacy => name.to_string(),
            Self::Registry => {
                name.strip_prefix(DEFAULT_PROVIDER_NAMESPACE).unwrap_or(name).to_string()
            }
        }
    }

    fn raw_to_qualified(&self, name: &str) -> String {
        match self {
            Self::Legacy => name.to_string(),
            Self::Registry if name.contains('/') => name.to_string(),
            Self::Registry => format!("{DEFAULT_PROVIDER_NAMESPACE}{name}"),
        }
    }
}

/// A provider name bound to the naming scheme it was read under.
///
/// Equality and hashing use the qualified name, so the same provider compares equal
/// whether it was built from `aws` or from its registry address.
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    raw: String,
    scheme: NamingScheme,
}

impl ProviderIdentity {
    /// Build an identity from a raw (short) name.
    pub fn from_raw(raw: impl Into<String>, scheme: NamingScheme) -> Self {
        Self {
            raw: raw.into(),
            scheme,
        }
    }

    /// Build an identity from a qualified name as found in a schema document.
    pub fn from_qualified(qualified: &str, scheme: NamingScheme) -> Self {
        Self {
            raw: scheme.qualified_to_raw(qualified),
            scheme,
        }
    }

    /// The short provider name, e.g. `aws`.
    pub fn raw_name(&self) -> &str {
        &self.raw
    }

    /// The fully qualified provider name under this identity's scheme.
    pub fn qualified_name(&self) -> String {
        self.scheme.raw_to_qualified(&self.raw)
    }
}

impl PartialEq for ProviderIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.qualified_name() == other.qualified_name()
    }
}

impl Eq for ProviderIdentity {}

impl Hash for ProviderIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.qualified_name().hash(state);
    }
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}
