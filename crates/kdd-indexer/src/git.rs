//! Git adapter for the incremental driver.
//!
//! Shells out to `git`; the engine only ever asks for the current commit
//! and a `--name-status` diff between two refs.

use crate::error::{IndexerError, Result};
use crate::incremental::{DiffEntry, DiffStatus, VcsDiff};
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct GitAdapter {
    repo_root: PathBuf,
}

impl GitAdapter {
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .map_err(|e| IndexerError::GitNotAvailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("unknown revision") || stderr.contains("bad revision") {
                return Err(IndexerError::CommitNotFound(stderr.trim().to_string()));
            }
            return Err(IndexerError::GitNotAvailable(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    #[must_use]
    pub fn is_repo(root: &Path) -> bool {
        Command::new("git")
            .args(["rev-parse", "--git-dir"])
            .current_dir(root)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl VcsDiff for GitAdapter {
    fn current_commit(&self) -> Result<Option<String>> {
        match self.run(&["rev-parse", "HEAD"]) {
            Ok(commit) if !commit.is_empty() => Ok(Some(commit)),
            Ok(_) => Ok(None),
            Err(IndexerError::CommitNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn diff(&self, base: &str, head: &str) -> Result<Vec<DiffEntry>> {
        let output = self.run(&["diff", "--name-status", base, head])?;
        let mut entries = Vec::new();
        for line in output.lines() {
            let mut parts = line.split('\t');
            let Some(status) = parts.next() else { continue };
            let Some(first_path) = parts.next() else { continue };

            let entry = match status.chars().next() {
                Some('A') => DiffEntry {
                    path: first_path.to_string(),
                    status: DiffStatus::Added,
                },
                Some('M') => DiffEntry {
                    path: first_path.to_string(),
                    status: DiffStatus::Modified,
                },
                Some('D') => DiffEntry {
                    path: first_path.to_string(),
                    status: DiffStatus::Deleted,
                },
                // Renames carry two paths: old then new.
                Some('R') => {
                    let Some(new_path) = parts.next() else { continue };
                    DiffEntry {
                        path: new_path.to_string(),
                        status: DiffStatus::Renamed {
                            old: first_path.to_string(),
                        },
                    }
                }
                _ => continue,
            };
            entries.push(entry);
        }
        Ok(entries)
    }
}
