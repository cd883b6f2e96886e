//! Read-only queries used for display and for pre-flight checks before a rewrite.

use crate::model::{RewriteError, RewriteResult};
use anyhow::anyhow;
use git_executor::git_command_executor::GitCommandExecutor;
use std::path::{Path, PathBuf};
use tracing::instrument;

fn query(git: &GitCommandExecutor, repo_path: &str, args: &[&str]) -> RewriteResult<String> {
  git.execute_command(args, repo_path).map_err(RewriteError::RepositoryQuery)
}

/// Current branch name, or `DETACHED`
#[instrument(skip(git))]
pub fn current_branch(git: &GitCommandExecutor, repo_path: &str) -> RewriteResult<String> {
  let branch = query(git, repo_path, &["branch", "--show-current"])?;
  if branch.is_empty() { Ok(String::from("DETACHED")) } else { Ok(branch) }
}

pub fn head_sha(git: &GitCommandExecutor, repo_path: &str) -> RewriteResult<String> {
  query(git, repo_path, &["rev-parse", "HEAD"])
}

pub fn head_short_sha(git: &GitCommandExecutor, repo_path: &str) -> RewriteResult<String> {
  query(git, repo_path, &["rev-parse", "--short", "HEAD"])
}

/// Patch text of a commit (without the header)
pub fn commit_diff(git: &GitCommandExecutor, repo_path: &str, sha: &str) -> RewriteResult<String> {
  git
    .execute_command_raw(&["--no-pager", "show", "--format=", "--no-color", sha], repo_path)
    .map_err(|e| RewriteError::RepositoryQuery(anyhow!("failed to fetch diff of {sha}: {e}")))
}

/// Patch of one file within a commit
pub fn file_diff_in_commit(git: &GitCommandExecutor, repo_path: &str, sha: &str, path: &str) -> RewriteResult<String> {
  git
    .execute_command_raw(&["--no-pager", "show", "--format=", "--no-color", sha, "--", path], repo_path)
    .map_err(|e| RewriteError::RepositoryQuery(anyhow!("failed to fetch diff of {path} in {sha}: {e}")))
}

/// Patch of one file within a commit, byte-exact and in the shape `git apply` expects.
/// Plumbing with explicit prefixes, so `diff.noprefix`, external diff drivers and textconv
/// filters in the user's config do not change it.
#[instrument(skip(git))]
pub fn file_patch_in_commit(git: &GitCommandExecutor, repo_path: &str, sha: &str, path: &str) -> RewriteResult<Vec<u8>> {
  git
    .execute_command_bytes(
      &[
        "diff-tree",
        "-p",
        "--root",
        "--no-commit-id",
        "--no-color",
        "--no-ext-diff",
        "--no-textconv",
        "--src-prefix=a/",
        "--dst-prefix=b/",
        sha,
        "--",
        path,
      ],
      repo_path,
    )
    .map_err(|e| RewriteError::RepositoryQuery(anyhow!("failed to fetch patch of {path} in {sha}: {e}")))
}

pub fn full_message(git: &GitCommandExecutor, repo_path: &str, sha: &str) -> RewriteResult<String> {
  query(git, repo_path, &["log", "-1", "--format=%B", sha])
}

/// `Name <email>, 05 Feb 2026 14:03`
pub fn commit_metadata(git: &GitCommandExecutor, repo_path: &str, sha: &str) -> RewriteResult<String> {
  query(git, repo_path, &["log", "-1", "--format=%an <%ae>, %ad", "--date=format:%d %b %Y %H:%M", sha])
}

/// Paths changed by a commit (root commits included)
#[instrument(skip(git))]
pub fn commit_files(git: &GitCommandExecutor, repo_path: &str, sha: &str) -> RewriteResult<Vec<String>> {
  git
    .execute_command_lines(&["diff-tree", "--no-commit-id", "--root", "-r", "--name-only", sha], repo_path)
    .map_err(|e| RewriteError::RepositoryQuery(anyhow!("failed to list files of {sha}: {e}")))
}

/// Staged or unstaged changes to tracked files; untracked files do not block a rebase
#[instrument(skip(git))]
pub fn has_uncommitted_changes(git: &GitCommandExecutor, repo_path: &str) -> RewriteResult<bool> {
  Ok(!query(git, repo_path, &["status", "--porcelain", "--untracked-files=no"])?.is_empty())
}

pub fn git_dir(git: &GitCommandExecutor, repo_path: &str) -> RewriteResult<PathBuf> {
  let dir = query(git, repo_path, &["rev-parse", "--git-dir"])?;
  Ok(Path::new(repo_path).join(dir))
}

/// Whether git has interactive or am-style rebase state on disk
#[instrument(skip(git))]
pub fn is_rebase_in_progress(git: &GitCommandExecutor, repo_path: &str) -> RewriteResult<bool> {
  let dir = git_dir(git, repo_path)?;
  Ok(dir.join("rebase-merge").is_dir() || dir.join("rebase-apply").is_dir())
}

pub fn is_ancestor(git: &GitCommandExecutor, repo_path: &str, ancestor: &str, descendant: &str) -> RewriteResult<bool> {
  let (_, exit_code) = git
    .execute_command_with_status(&["merge-base", "--is-ancestor", ancestor, descendant], repo_path)
    .map_err(RewriteError::RepositoryQuery)?;
  Ok(exit_code == 0)
}
