//! Platform-specific path helpers.
//!
//! Root modules, plugin lock files and module manifests are compared by path
//! throughout the crate. These helpers define what "the same path" means:
//! lexical normalization of `.` and `..`, no trailing separators, and
//! case-insensitive comparison on Windows only. None of them touch the filesystem.

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

/// Checks if the current platform is Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Lexically normalizes a path.
///
/// `.` components are dropped and `..` removes the previous normal component.
/// Leading `..` components of relative paths are kept, and `..` never climbs
/// above the root of an absolute path.
///
/// # Examples
///
/// ```rust
/// use tfroot::utils::platform::normalize_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(normalize_path(Path::new("/proj/./modules/../vpc")), PathBuf::from("/proj/vpc"));
/// assert_eq!(normalize_path(Path::new("../src/./lib.rs")), PathBuf::from("../src/lib.rs"));
/// ```
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            c => components.push(c),
        }
    }

    if components.is_empty() {
        return PathBuf::from(".");
    }
    components.iter().collect()
}

/// Compares two paths for equality with platform-specific rules.
///
/// Both paths are normalized first. On Windows the comparison ignores case and
/// treats `/` and `\` alike; elsewhere it is case-sensitive.
///
/// # Examples
///
/// ```rust
/// use tfroot::utils::platform::paths_equal;
/// use std::path::Path;
///
/// assert!(paths_equal(Path::new("/proj/modules/vpc/"), Path::new("/proj/modules/./vpc")));
/// assert!(!paths_equal(Path::new("/proj/a"), Path::new("/proj/b")));
/// ```
#[must_use]
pub fn paths_equal(path1: &Path, path2: &Path) -> bool {
    let p1 = normalize_path(path1);
    let p2 = normalize_path(path2);

    if is_windows() {
        let p1 = p1.to_string_lossy().replace('/', "\\").to_lowercase();
        let p2 = p2.to_string_lossy().replace('/', "\\").to_lowercase();
        p1.trim_end_matches('\\') == p2.trim_end_matches('\\')
    } else {
        p1 == p2
    }
}

/// Expand `~` and `$VAR` references in a user-supplied path.
///
/// Undefined variables are an error rather than being left in place.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| {
        format!(
            "Failed to expand path: {path}\n\n\
            Use $VAR or ${{VAR}} for environment variables and ~/ for the home directory"
        )
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_removes_cur_and_parent() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("a/b/..")), PathBuf::from("a"));
    }

    #[test]
    fn test_normalize_keeps_leading_parent_dirs() {
        assert_eq!(normalize_path(Path::new("../../x")), PathBuf::from("../../x"));
        assert_eq!(normalize_path(Path::new("/..")), PathBuf::from("/"));
    }

    #[test]
    fn test_normalize_empty_becomes_dot() {
        assert_eq!(normalize_path(Path::new("a/..")), PathBuf::from("."));
    }

    #[test]
    fn test_paths_equal_ignores_trailing_separator() {
        assert!(paths_equal(Path::new("/proj/"), Path::new("/proj")));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_paths_equal_is_case_sensitive_on_unix() {
        assert!(!paths_equal(Path::new("/Proj"), Path::new("/proj")));
    }

    #[cfg(windows)]
    #[test]
    fn test_paths_equal_is_case_insensitive_on_windows() {
        assert!(paths_equal(Path::new("C:\\Proj"), Path::new("c:/proj")));
    }

    #[test]
    fn test_expand_path() {
        assert_eq!(expand_path("/usr/bin/terraform").unwrap(), PathBuf::from("/usr/bin/terraform"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/bin/terraform").unwrap(), home.join("bin/terraform"));
        }
        assert!(expand_path("$TFROOT_SURELY_UNDEFINED_VARIABLE/terraform").is_err());
    }
}
