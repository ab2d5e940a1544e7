// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Workspace manager — one scratch directory per job, removed when the job
// ends whichever way it ends.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use unmark_core::RunId;
use unmark_core::error::{Result, UnmarkError};

/// Hands out per-job workspaces under `<scratch>/unmark-<run id>/`.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    run_root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(scratch_root: &Path, run_id: RunId) -> Self {
        Self {
            run_root: scratch_root.join(format!("unmark-{}", run_id)),
        }
    }

    pub fn run_root(&self) -> &Path {
        &self.run_root
    }

    /// Directory a job's workspace would occupy.
    pub fn path_for(&self, relative: &Path) -> PathBuf {
        self.run_root.join(format!("ws-{}", workspace_key(relative)))
    }

    /// Create a fresh, empty workspace for the job identified by `relative`.
    ///
    /// Fails if the directory already exists, so two live jobs never share one.
    pub fn acquire(&self, relative: &Path) -> Result<Workspace> {
        fs::create_dir_all(&self.run_root).map_err(|err| {
            UnmarkError::Workspace(format!(
                "cannot create scratch root {}: {}",
                self.run_root.display(),
                err
            ))
        })?;

        let path = self.path_for(relative);
        fs::create_dir(&path).map_err(|err| match err.kind() {
            ErrorKind::AlreadyExists => UnmarkError::Workspace(format!(
                "workspace {} is already in use",
                path.display()
            )),
            _ => UnmarkError::Workspace(format!("cannot create {}: {}", path.display(), err)),
        })?;

        debug!(workspace = %path.display(), job = %relative.display(), "Workspace acquired");
        Ok(Workspace {
            path,
            released: false,
        })
    }

    /// Remove the run's scratch root once every job is done.
    pub fn finish(&self) -> Option<String> {
        remove_tree(&self.run_root)
    }
}

/// Owning guard over one job's scratch directory.
///
/// Dropping the guard removes the directory; [`Workspace::release`] does the
/// same but hands back any removal problem as a warning.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> Option<String> {
        self.released = true;
        remove_tree(&self.path)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.released {
            remove_tree(&self.path);
        }
    }
}

/// First 16 hex digits of SHA-256 over the `/`-joined relative path.
pub fn workspace_key(relative: &Path) -> String {
    let normalised = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    let mut hasher = Sha256::new();
    hasher.update(normalised.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

fn remove_tree(path: &Path) -> Option<String> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Scratch directory removed");
            None
        }
        Err(err) if err.kind() == ErrorKind::NotFound => None,
        Err(err) => {
            let message = format!("could not remove {}: {}", path.display(), err);
            warn!("{}", message);
            Some(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_and_separator_agnostic() {
        let a = workspace_key(Path::new("sub/b.pdf"));
        let b = workspace_key(&Path::new("sub").join("b.pdf"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, workspace_key(Path::new("sub/c.pdf")));
    }

    #[test]
    fn release_removes_directory_and_contents() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path(), RunId::new());
        let ws = manager.acquire(Path::new("a.pdf")).unwrap();
        let path = ws.path().to_path_buf();
        fs::write(path.join("page_0001.png"), b"x").unwrap();

        assert!(ws.release().is_none());
        assert!(!path.exists());
        assert!(manager.finish().is_none());
        assert!(!manager.run_root().exists());
    }

    #[test]
    fn drop_removes_directory() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path(), RunId::new());
        let path = {
            let ws = manager.acquire(Path::new("a.pdf")).unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn drop_during_unwind_removes_directory() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path(), RunId::new());
        let expected = manager.path_for(Path::new("boom.pdf"));

        let result = std::panic::catch_unwind(|| {
            let _ws = manager.acquire(Path::new("boom.pdf")).unwrap();
            panic!("engine blew up");
        });
        assert!(result.is_err());
        assert!(!expected.exists());
    }

    #[test]
    fn removal_failure_is_reported_not_raised() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path(), RunId::new());
        let ws = manager.acquire(Path::new("a.pdf")).unwrap();

        // A file where the run root was leaves the workspace path unresolvable.
        fs::remove_dir_all(manager.run_root()).unwrap();
        fs::write(manager.run_root(), b"").unwrap();

        let warning = ws.release().expect("removal warning");
        assert!(warning.contains("could not remove"), "{warning}");
        assert!(manager.finish().is_some());
    }

    #[test]
    fn live_workspace_cannot_be_acquired_twice() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path(), RunId::new());
        let _first = manager.acquire(Path::new("a.pdf")).unwrap();
        let err = manager.acquire(Path::new("a.pdf")).unwrap_err();
        assert!(matches!(err, UnmarkError::Workspace(_)));
    }

    #[test]
    fn distinct_jobs_get_distinct_workspaces() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path(), RunId::new());
        let a = manager.acquire(Path::new("a.pdf")).unwrap();
        let b = manager.acquire(Path::new("sub/a.pdf")).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(manager.run_root()));
    }
}
