//! Cross-platform utilities
//!
//! - [`platform`] - Path normalization and comparison rules

pub mod platform;

pub use platform::{expand_path, is_windows, normalize_path, paths_equal};
