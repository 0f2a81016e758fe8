//! Isolated per-issue checkouts built on `git worktree`.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::command::GitCli;
use crate::error::GitError;

/// Version-control operations the execute loop needs.
pub trait WorkspaceOps {
    /// Fresh checkout of `base` at `path` on a new `branch`, discarding any
    /// previous worktree or branch with the same names.
    fn create_isolated_workspace(&self, path: &Path, branch: &str, base: &str)
        -> Result<(), GitError>;
    fn remove_workspace(&self, path: &Path) -> Result<(), GitError>;
    /// Stage and commit everything. Returns `false` when there was nothing to commit.
    fn commit_all(&self, path: &Path, message: &str) -> Result<bool, GitError>;
    fn push(&self, path: &Path, branch: &str) -> Result<(), GitError>;
    fn has_uncommitted_changes(&self, path: &Path) -> Result<bool, GitError>;
}

pub fn branch_name_for_issue(issue_number: u64) -> String {
    format!("pilot/issue-{issue_number}")
}

pub fn workspace_path_for_issue(local_path: &Path, worktree_root: &Path, issue_number: u64) -> PathBuf {
    local_path
        .join(worktree_root)
        .join(format!("issue-{issue_number}"))
}

pub fn commit_message_for_issue(issue_number: u64) -> String {
    format!("pilot: resolve issue #{issue_number}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitWorkspace {
    git: GitCli,
    repo_root: PathBuf,
}

impl GitWorkspace {
    pub fn new(git: GitCli, repo_root: impl Into<PathBuf>) -> Self {
        Self {
            git,
            repo_root: repo_root.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    fn discard_existing(&self, path: &Path, branch: &str) -> Result<(), GitError> {
        let args = [
            OsString::from("worktree"),
            OsString::from("remove"),
            OsString::from("--force"),
            path.as_os_str().to_os_string(),
        ];
        if let Err(err) = self.git.run(&self.repo_root, args) {
            debug!(path = %path.display(), error = %err, "no registered worktree to remove");
        }

        if path.exists() {
            fs::remove_dir_all(path).map_err(|source| GitError::Io {
                context: format!("remove_dir_all {}", path.display()),
                source,
            })?;
        }
        self.git.run(&self.repo_root, ["worktree", "prune"])?;

        if let Err(err) = self.git.run(&self.repo_root, ["branch", "-D", branch]) {
            debug!(branch, error = %err, "no local branch to delete");
        }
        Ok(())
    }
}

impl WorkspaceOps for GitWorkspace {
    fn create_isolated_workspace(
        &self,
        path: &Path,
        branch: &str,
        base: &str,
    ) -> Result<(), GitError> {
        self.git.run(&self.repo_root, ["fetch", "origin", base])?;
        self.discard_existing(path, branch)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| GitError::Io {
                context: format!("create_dir_all {}", parent.display()),
                source,
            })?;
        }

        let args = [
            OsString::from("worktree"),
            OsString::from("add"),
            OsString::from("-b"),
            OsString::from(branch),
            path.as_os_str().to_os_string(),
            OsString::from(format!("origin/{base}")),
        ];
        self.git.run(&self.repo_root, args)?;

        info!(path = %path.display(), branch, base, "created isolated workspace");
        Ok(())
    }

    fn remove_workspace(&self, path: &Path) -> Result<(), GitError> {
        let args = [
            OsString::from("worktree"),
            OsString::from("remove"),
            OsString::from("--force"),
            path.as_os_str().to_os_string(),
        ];
        self.git.run(&self.repo_root, args)?;
        Ok(())
    }

    fn commit_all(&self, path: &Path, message: &str) -> Result<bool, GitError> {
        self.git.run(path, ["add", "-A"])?;

        match self.git.run(path, ["commit", "-m", message]) {
            Ok(_) => Ok(true),
            Err(err) if err.command_output().contains("nothing to commit") => {
                debug!(path = %path.display(), "nothing to commit");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    fn push(&self, path: &Path, branch: &str) -> Result<(), GitError> {
        self.git.run(path, ["push", "-u", "origin", branch])?;
        Ok(())
    }

    fn has_uncommitted_changes(&self, path: &Path) -> Result<bool, GitError> {
        let output = self.git.run(path, ["status", "--porcelain"])?;
        Ok(!output.stdout.trim().is_empty())
    }
}
