//! On-disk files a root module tracks.
//!
//! `terraform init` leaves two kinds of cache files behind that matter here:
//!
//! - a plugin lock file, pinning provider versions (its location changed across
//!   terraform releases, see [`plugin_lock_file_paths`])
//! - the module manifest, `.terraform/modules/modules.json`
//!
//! Both are handled through the [`File`] abstraction so callers (a file watcher, a
//! protocol handler) can hand in whatever handle type they use.

use crate::constants::{DATA_DIR, DEPENDENCY_LOCK_FILE};
use std::fmt::Debug;
use std::io;
use std::path::{Component, Path, PathBuf};

/// A handle to a file on disk.
pub trait File: Debug + Send + Sync {
    /// Absolute path of the file.
    fn path(&self) -> &Path;
}

/// A file discovered on disk and tracked by a root module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    path: PathBuf,
}

impl TrackedFile {
    /// Track `path` without checking that it exists.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Track `path` if it exists and is a regular file.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a regular file", path.display()),
            ));
        }
        Ok(Self {
            path,
        })
    }

    /// Copy any [`File`] into an owned handle.
    pub fn from_file(file: &dyn File) -> Self {
        Self::new(file.path())
    }
}

impl File for TrackedFile {
    fn path(&self) -> &Path {
        &self.path
    }
}

/// Candidate plugin lock file locations, newest terraform layout first.
///
/// - `>= 0.14`: `.terraform.lock.hcl`
/// - `0.13`: `.terraform/plugins/selections.json`
/// - `<= 0.12`: `.terraform/plugins/<os>_<arch>/lock.json`
pub fn plugin_lock_file_paths(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join(DEPENDENCY_LOCK_FILE),
        dir.join(DATA_DIR).join("plugins").join("selections.json"),
        dir.join(DATA_DIR).join("plugins").join(platform_dir_name()).join("lock.json"),
    ]
}

/// Location of the module manifest for the root module in `dir`.
pub fn module_manifest_file_path(dir: &Path) -> PathBuf {
    dir.join(DATA_DIR).join("modules").join("modules.json")
}

/// Track the first of `paths` that exists.
///
/// Fails with [`io::ErrorKind::NotFound`] if none does; other I/O errors are
/// returned as soon as they are hit.
pub fn find_file(paths: &[PathBuf]) -> io::Result<TrackedFile> {
    for path in paths {
        match TrackedFile::open(path) {
            Ok(file) => return Ok(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("none of {} candidate files exist", paths.len()),
    ))
}

/// The root module directory a tracked cache file belongs to.
///
/// For files inside the data directory this is the parent of `.terraform`;
/// for anything else (e.g. `.terraform.lock.hcl`) it is the file's parent.
pub fn root_module_dir_from_file_path(path: &Path) -> PathBuf {
    let mut root = PathBuf::new();
    for component in path.components() {
        if component == Component::Normal(DATA_DIR.as_ref()) {
            return root;
        }
        root.push(component);
    }
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn platform_dir_name() -> String {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    };
    format!("{os}_{arch}")
}
