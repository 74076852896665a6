//! Workspace-wide root module management.
//!
//! [`RootModuleManager`] keeps one [`RootModule`] per initialized directory, finds
//! those directories by walking a workspace, and routes file change events to the
//! module tracking the changed file. It also answers the question an editor asks
//! when a file is opened: which root module(s) does this file belong to?

use crate::config::Settings;
use crate::constants::DATA_DIR;
use crate::core::TfError;
use crate::rootmodule::files::root_module_dir_from_file_path;
use crate::rootmodule::{RootModule, RootModuleOptions, TrackedFile};
use crate::utils::platform::normalize_path;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Owns the root modules of a workspace.
pub struct RootModuleManager {
    modules: DashMap<PathBuf, Arc<RootModule>>,
    settings: Settings,
    options: RootModuleOptions,
}

impl RootModuleManager {
    /// A manager building root modules from `settings`.
    pub fn new(settings: Settings) -> Self {
        let options = RootModuleOptions::from_settings(&settings);
        Self::with_options(settings, options)
    }

    /// A manager building root modules with explicit `options`.
    pub fn with_options(settings: Settings, options: RootModuleOptions) -> Self {
        Self {
            modules: DashMap::new(),
            settings,
            options,
        }
    }

    async fn add(&self, dir: &Path) -> Result<Arc<RootModule>, TfError> {
        let key = normalize_path(dir);
        if self.modules.contains_key(&key) {
            return Err(TfError::Other {
                message: format!("root module {} was already added", dir.display()),
            });
        }

        let module = Arc::new(RootModule::new(&key, self.options.clone()));
        module.discover_caches().await?;

        match self.modules.entry(key) {
            Entry::Occupied(_) => Err(TfError::Other {
                message: format!("root module {} was already added", dir.display()),
            }),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&module));
                tracing::debug!(target: "manager", "Added root module {}", dir.display());
                Ok(module)
            }
        }
    }

    /// Add the root module in `dir` and load it in the background.
    pub async fn add_and_start_loading(&self, dir: &Path) -> Result<Arc<RootModule>, TfError> {
        let module = self.add(dir).await?;
        drop(module.start_loading());
        Ok(module)
    }

    /// Add the root module in `dir` and load it before returning.
    ///
    /// Load failures do not fail the call; they are available through
    /// [`RootModule::load_error`].
    pub async fn add_and_load(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Arc<RootModule>, TfError> {
        let module = self.add(dir).await?;
        if let Err(e) = module.load(cancel).await {
            tracing::warn!(target: "manager", "Root module {} loaded with errors: {}", dir.display(), e);
        }
        Ok(module)
    }

    pub fn root_module_by_path(&self, dir: &Path) -> Option<Arc<RootModule>> {
        self.modules.get(&normalize_path(dir)).map(|entry| Arc::clone(entry.value()))
    }

    /// Root modules a file in `dir` may belong to.
    ///
    /// A root module located at `dir` is the only candidate. Otherwise every module
    /// that calls `dir` as a local module is one, sorted by path.
    pub fn root_module_candidates_by_path(&self, dir: &Path) -> Vec<Arc<RootModule>> {
        if let Some(module) = self.root_module_by_path(dir) {
            return vec![module];
        }

        let mut candidates: Vec<_> = self
            .modules
            .iter()
            .filter(|entry| entry.value().references_module_path(dir))
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        candidates.sort_by(|a, b| a.path().cmp(b.path()));
        candidates
    }

    /// All managed root modules, sorted by path.
    pub fn list_root_modules(&self) -> Vec<Arc<RootModule>> {
        let mut modules: Vec<_> = self.modules.iter().map(|entry| Arc::clone(entry.value())).collect();
        modules.sort_by(|a, b| a.path().cmp(b.path()));
        modules
    }

    /// Cache files of every managed root module.
    pub async fn paths_to_watch(&self) -> Vec<PathBuf> {
        let modules = self.list_root_modules();
        join_all(modules.iter().map(|m| m.paths_to_watch())).await.into_iter().flatten().collect()
    }

    /// Cancel background loads of every managed root module.
    pub fn cancel_loading(&self) {
        for entry in &self.modules {
            entry.value().cancel_loading();
        }
    }

    /// React to a change of the cache file at `path`.
    ///
    /// A known module manifest is re-read and a known plugin lock file triggers a
    /// schema refresh. A lock file that appeared in a managed module's directory
    /// (typically after a first `terraform init`) is discovered and loaded. Returns
    /// the number of modules that reacted without error; a failing module is logged
    /// and does not stop the others.
    pub async fn handle_file_change(&self, path: &Path, cancel: &CancellationToken) -> Result<usize, TfError> {
        let file = TrackedFile::new(path);
        let mut matched = false;
        let mut handled = 0;

        for module in self.list_root_modules() {
            let result = if module.is_known_module_manifest_file(path) {
                tracing::debug!(target: "manager", "Module manifest changed: {}", path.display());
                module.update_module_manifest(Some(&file))
            } else if module.is_known_plugin_lock_file(path).await {
                tracing::debug!(target: "manager", "Plugin lock file changed: {}", path.display());
                module.update_schema_cache(cancel, Some(&file)).await
            } else {
                continue;
            };

            matched = true;
            match result {
                Ok(()) => handled += 1,
                Err(e) => tracing::warn!(
                    target: "manager",
                    "Root module {} failed to handle {}: {}",
                    module.path().display(),
                    path.display(),
                    e
                ),
            }
        }
        if matched {
            return Ok(handled);
        }

        let root = root_module_dir_from_file_path(path);
        if let Some(module) = self.root_module_by_path(&root) {
            tracing::debug!(target: "manager", "New cache file {} for {}", path.display(), root.display());
            module.discover_caches().await?;
            if let Err(e) = module.load(cancel).await {
                tracing::warn!(target: "manager", "Reloading {} failed: {}", root.display(), e);
            }
            handled += 1;
        }
        Ok(handled)
    }

    /// Directories under `workspace` in which `terraform init` has been run.
    ///
    /// `.terraform` directories themselves and directories named in
    /// `exclude_dirs` are not descended into.
    pub fn walk(&self, workspace: &Path) -> Result<Vec<PathBuf>, TfError> {
        let mut roots = Vec::new();
        let walker = WalkDir::new(workspace).follow_links(false).into_iter().filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            entry.file_type().is_dir() && name != DATA_DIR && name != ".git" && !self.settings.is_excluded(&name)
        });

        for entry in walker {
            let entry = entry.map_err(|e| TfError::Other {
                message: format!("Failed to walk {}: {e}", workspace.display()),
            })?;
            if entry.path().join(DATA_DIR).is_dir() {
                tracing::trace!(target: "manager", "Found root module {}", entry.path().display());
                roots.push(entry.into_path());
            }
        }

        roots.sort();
        Ok(roots)
    }

    /// Walk `workspace` and load every root module found, concurrently.
    pub async fn load_workspace(
        &self,
        workspace: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<RootModule>>, TfError> {
        let dirs = self.walk(workspace)?;
        tracing::info!(target: "manager", "Found {} root modules in {}", dirs.len(), workspace.display());

        let results = join_all(dirs.iter().map(|dir| self.add_and_load(dir, cancel))).await;
        results.into_iter().collect()
    }
}

impl std::fmt::Debug for RootModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootModuleManager")
            .field("modules", &self.modules.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// `candidate` relative to `root_dir`, or `.` for the root itself.
///
/// Candidates outside `root_dir` are rendered unchanged.
pub fn render_candidate_path(root_dir: &Path, candidate: &Path) -> String {
    match candidate.strip_prefix(root_dir) {
        Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
        Ok(relative) => relative.display().to_string(),
        Err(_) => candidate.display().to_string(),
    }
}

/// Warning to show when `file_name` is opened, if any.
///
/// No candidates means the file is outside every known root module. More than one
/// means the first was picked and the rest are listed.
pub fn candidates_message(root_dir: &Path, file_name: &str, candidates: &[PathBuf]) -> Option<String> {
    match candidates {
        [] => Some(format!(
            "No root module found for {file_name}. Functionality may be limited. \
             You may need to run terraform init"
        )),
        [_] => None,
        [picked, alternatives @ ..] => {
            let others =
                alternatives.iter().map(|c| render_candidate_path(root_dir, c)).collect::<Vec<_>>().join(", ");
            Some(format!(
                "Alternative root modules found for {file_name} ({others}), picked: {}",
                render_candidate_path(root_dir, picked)
            ))
        }
    }
}
