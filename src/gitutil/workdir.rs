/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: gitutil/workdir.rs
 *
 * A process-wide registry of temporary Git clone directories (spec.md §5,
 * "Shared resources"). The ProposedCommit reconciler's SHA-resolution
 * mechanism (out of scope per spec.md §4.2) is expected to register every
 * workdir it creates here so that `drain` can remove them all on shutdown,
 * even if the reconciliation that created one never got to clean it up
 * itself. Mirrors the `Arc<Mutex<HashMap<...>>>` shared-state convention
 * used for per-resource locks in the pack's secret-manager-controller
 * `Reconciler` type.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

#[derive(Default)]
pub struct WorkdirRegistry {
    paths: Mutex<HashSet<PathBuf>>,
}

impl WorkdirRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: impl Into<PathBuf>) {
        self.paths.lock().unwrap().insert(path.into());
    }

    pub fn unregister(&self, path: &Path) {
        self.paths.lock().unwrap().remove(path);
    }

    /// Removes every registered path from disk. Called once on shutdown.
    pub fn drain(&self) {
        let paths: Vec<PathBuf> = self.paths.lock().unwrap().drain().collect();
        for path in paths {
            if let Err(err) = std::fs::remove_dir_all(&path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %err, "failed to remove git workdir");
                }
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.paths.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_drain_removes_directory() {
        let registry = WorkdirRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.into_path();
        registry.register(&path);
        assert_eq!(registry.len(), 1);
        registry.drain();
        assert!(!path.exists());
    }

    #[test]
    fn unregister_removes_from_tracking_without_deleting() {
        let registry = WorkdirRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        registry.register(&path);
        registry.unregister(&path);
        assert_eq!(registry.len(), 0);
        assert!(path.exists());
    }
}
