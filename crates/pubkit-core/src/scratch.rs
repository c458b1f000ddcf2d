//! Staging directories that are always cleaned up.
//!
//! A [`ScratchWorkspace`] keeps an append-only log of every path a pipeline
//! created. Teardown deletes exactly those paths, so anything the operator
//! authored is left alone. The [`ScratchManager`] remembers every workspace it
//! handed out so an interrupted run can still be cleaned up.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Errors from staging directory management.
#[derive(Debug, thiserror::Error)]
pub enum ScratchError {
    #[error("The directory '{}' already exists.", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Directory not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Failed to create {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove {} scratch path(s): {}", .failures.len(), .failures.join("; "))]
    Teardown { failures: Vec<String> },
}

#[derive(Debug)]
struct WorkspaceInner {
    root: PathBuf,
    created: Vec<PathBuf>,
    torn_down: bool,
}

/// A staging tree plus the log of paths created for it.
///
/// Clones share the same log.
#[derive(Debug, Clone)]
pub struct ScratchWorkspace {
    inner: Arc<Mutex<WorkspaceInner>>,
}

impl ScratchWorkspace {
    fn new(root: PathBuf) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WorkspaceInner {
                root,
                created: Vec::new(),
                torn_down: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorkspaceInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Root of the staging tree.
    pub fn root(&self) -> PathBuf {
        self.lock().root.clone()
    }

    /// Record a path for removal at teardown.
    ///
    /// Call this before the operation that creates `path`, so a failure
    /// halfway through still gets cleaned up.
    pub fn track(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut inner = self.lock();
        if inner.torn_down {
            tracing::warn!(
                "Tracking {} after teardown; it will not be removed",
                path.display()
            );
        }
        tracing::debug!("Tracking {}", path.display());
        inner.created.push(path);
    }

    /// Paths tracked so far, in creation order.
    pub fn created_paths(&self) -> Vec<PathBuf> {
        self.lock().created.clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.lock().torn_down
    }

    /// Remove every tracked path, newest first.
    ///
    /// Paths that are already gone are skipped. Failures on individual paths
    /// do not stop the sweep; they are reported together at the end. Only the
    /// first call does any work.
    pub fn teardown(&self) -> Result<(), ScratchError> {
        let created = {
            let mut inner = self.lock();
            if inner.torn_down {
                return Ok(());
            }
            inner.torn_down = true;
            std::mem::take(&mut inner.created)
        };

        let mut failures = Vec::new();
        for path in created.iter().rev() {
            if let Err(e) = remove_path(path) {
                failures.push(format!("{}: {}", path.display(), e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ScratchError::Teardown { failures })
        }
    }
}

fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => {
            tracing::debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Hands out workspaces and remembers them for shutdown.
#[derive(Debug, Clone, Default)]
pub struct ScratchManager {
    workspaces: Arc<Mutex<Vec<ScratchWorkspace>>>,
}

impl ScratchManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, workspace: &ScratchWorkspace) {
        self.workspaces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(workspace.clone());
    }

    /// Allocate a fresh, uniquely named directory under `base`.
    pub fn create(&self, base: &Path) -> Result<ScratchWorkspace, ScratchError> {
        let root = base.join(format!(".pubkit-{}", uuid::Uuid::new_v4().simple()));
        let workspace = ScratchWorkspace::new(root.clone());
        self.register(&workspace);

        workspace.track(&root);
        fs::create_dir_all(&root).map_err(|source| ScratchError::Create {
            path: root.clone(),
            source,
        })?;

        Ok(workspace)
    }

    /// Adopt `root`, which some later operation will create.
    ///
    /// Fails without side effects if `root` already exists.
    pub fn claim(&self, root: &Path) -> Result<ScratchWorkspace, ScratchError> {
        if root.exists() {
            return Err(ScratchError::AlreadyExists(root.to_path_buf()));
        }

        let workspace = ScratchWorkspace::new(root.to_path_buf());
        self.register(&workspace);
        workspace.track(root);

        Ok(workspace)
    }

    /// Stage into an existing directory. The root itself is never removed.
    pub fn in_place(&self, root: &Path) -> Result<ScratchWorkspace, ScratchError> {
        if !root.is_dir() {
            return Err(ScratchError::Missing(root.to_path_buf()));
        }

        let workspace = ScratchWorkspace::new(root.to_path_buf());
        self.register(&workspace);

        Ok(workspace)
    }

    /// Number of workspaces not yet torn down.
    pub fn live(&self) -> usize {
        self.workspaces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|w| !w.is_torn_down())
            .count()
    }

    /// Tear down every workspace. Failures are logged, not returned.
    pub fn teardown_all(&self) {
        let workspaces: Vec<ScratchWorkspace> = self
            .workspaces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();

        for workspace in workspaces {
            if let Err(e) = workspace.teardown() {
                tracing::warn!("Cleanup of {} incomplete: {}", workspace.root().display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn create_allocates_unique_directories() {
        let temp = tempdir().unwrap();
        let manager = ScratchManager::new();

        let a = manager.create(temp.path()).unwrap();
        let b = manager.create(temp.path()).unwrap();

        assert_ne!(a.root(), b.root());
        assert!(a.root().is_dir());
        assert_eq!(a.created_paths(), vec![a.root()]);
        assert_eq!(manager.live(), 2);
    }

    #[test]
    fn teardown_removes_every_tracked_path() {
        let temp = tempdir().unwrap();
        let manager = ScratchManager::new();
        let workspace = manager.in_place(temp.path()).unwrap();

        let theme = temp.path().join("themes");
        let data = temp.path().join("_data").join("releases.yml");
        let authored = temp.path().join("index.md");

        workspace.track(&theme);
        fs::create_dir_all(theme.join("jekyll")).unwrap();
        workspace.track(&data);
        fs::create_dir_all(data.parent().unwrap()).unwrap();
        fs::write(&data, "stable: {}").unwrap();
        fs::write(&authored, "# Hello").unwrap();

        workspace.teardown().unwrap();

        assert!(!theme.exists());
        assert!(!data.exists());
        assert!(authored.exists());
        assert!(temp.path().exists());
    }

    #[test]
    fn teardown_tolerates_paths_removed_externally() {
        let temp = tempdir().unwrap();
        let manager = ScratchManager::new();
        let workspace = manager.in_place(temp.path()).unwrap();

        let gone = temp.path().join("gone");
        let never_created = temp.path().join("never-created");
        let kept = temp.path().join("kept.txt");

        workspace.track(&gone);
        fs::create_dir(&gone).unwrap();
        workspace.track(&never_created);
        workspace.track(&kept);
        fs::write(&kept, "x").unwrap();

        fs::remove_dir(&gone).unwrap();

        assert!(workspace.teardown().is_ok());
        assert!(!kept.exists());
    }

    #[test]
    fn teardown_runs_once() {
        let temp = tempdir().unwrap();
        let manager = ScratchManager::new();
        let workspace = manager.create(temp.path()).unwrap();
        let root = workspace.root();

        workspace.teardown().unwrap();
        assert!(!root.exists());
        assert!(workspace.is_torn_down());

        // A directory recreated at the same path survives a second call.
        fs::create_dir(&root).unwrap();
        workspace.teardown().unwrap();
        assert!(root.exists());
    }

    #[test]
    fn claim_refuses_existing_directory() {
        let temp = tempdir().unwrap();
        let pages = temp.path().join("gh-pages");
        fs::create_dir(&pages).unwrap();
        fs::write(pages.join("keep.txt"), "precious").unwrap();

        let manager = ScratchManager::new();
        let err = manager.claim(&pages).unwrap_err();

        assert!(err.to_string().contains("already exists"));
        assert!(pages.join("keep.txt").exists());
        assert_eq!(manager.live(), 0);
    }

    #[test]
    fn claim_tracks_root_before_creation() {
        let temp = tempdir().unwrap();
        let pages = temp.path().join("gh-pages");

        let manager = ScratchManager::new();
        let workspace = manager.claim(&pages).unwrap();
        assert_eq!(workspace.created_paths(), vec![pages.clone()]);

        fs::create_dir_all(pages.join("nested")).unwrap();
        manager.teardown_all();

        assert!(!pages.exists());
        assert_eq!(manager.live(), 0);
    }

    #[test]
    fn in_place_requires_existing_directory() {
        let temp = tempdir().unwrap();
        let manager = ScratchManager::new();

        let err = manager.in_place(&temp.path().join("docs")).unwrap_err();

        assert!(matches!(err, ScratchError::Missing(_)));
    }
}
