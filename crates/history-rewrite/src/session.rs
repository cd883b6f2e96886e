use crate::driver;
use crate::emit::emit;
use crate::history::{base_upstream, read_range, resolve_commit, root_commit};
use crate::model::{BaseAnchor, CommitRecord, RewriteError, RewriteOptions, RewriteRequest, RewriteResult, Upstream, short_sha};
use crate::plan::{PlanAction, RebasePlan, build_split_plan};
use crate::repo_info::{has_uncommitted_changes, head_sha, is_ancestor, is_rebase_in_progress};
use crate::request::{ResolvedRequest, resolve, resolve_split};
use git_executor::git_command_executor::GitCommandExecutor;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
  pub action: PlanAction,
  pub anchor: BaseAnchor,
}

/// A snapshot the user can return to
#[derive(Debug, Clone, PartialEq, Eq)]
struct Mark {
  head: String,
  anchor: BaseAnchor,
}

/// Owns the base anchor of one repository and runs rewrites against it.
/// Rewrites take `&mut self`, so only one can be in flight.
#[derive(Debug)]
pub struct RewriteSession {
  git: GitCommandExecutor,
  repo_path: String,
  anchor: BaseAnchor,
  start: Mark,
  best: Option<Mark>,
  options: RewriteOptions,
}

impl RewriteSession {
  /// Open a session on `repo_path`. Without `base` the root commit reachable from HEAD is used.
  #[instrument(skip(git, options))]
  pub fn open(git: GitCommandExecutor, repo_path: &str, base: Option<&str>, options: RewriteOptions) -> RewriteResult<Self> {
    let base_sha = match base {
      Some(rev) => resolve_commit(&git, repo_path, rev)?,
      None => root_commit(&git, repo_path)?,
    };
    // validates ancestry and linearity up front
    read_range(&git, repo_path, &base_sha)?;

    let anchor = BaseAnchor::new(base_sha);
    let start = Mark {
      head: head_sha(&git, repo_path)?,
      anchor: anchor.clone(),
    };
    info!(anchor = %short_sha(&anchor.sha), head = %short_sha(&start.head), "session opened");

    Ok(Self {
      git,
      repo_path: repo_path.to_string(),
      anchor,
      start,
      best: None,
      options,
    })
  }

  pub fn repo_path(&self) -> &str {
    &self.repo_path
  }

  pub fn git(&self) -> &GitCommandExecutor {
    &self.git
  }

  pub fn anchor(&self) -> &BaseAnchor {
    &self.anchor
  }

  pub fn start_head(&self) -> &str {
    &self.start.head
  }

  pub fn best_commit(&self) -> Option<&str> {
    self.best.as_ref().map(|mark| mark.head.as_str())
  }

  /// Commits from HEAD down to the anchor, newest-first
  pub fn history(&self) -> RewriteResult<Vec<CommitRecord>> {
    read_range(&self.git, &self.repo_path, &self.anchor.sha)
  }

  pub fn display_order(&self) -> RewriteResult<Vec<String>> {
    Ok(self.history()?.into_iter().map(|c| c.sha).collect())
  }

  #[instrument(skip(self), fields(operation = request.operation(), anchor = %short_sha(&self.anchor.sha)))]
  pub fn apply(&mut self, request: &RewriteRequest) -> RewriteResult<RewriteOutcome> {
    self.ensure_ready()?;

    let old_order = self.display_order()?;
    let fallback = base_upstream(&self.git, &self.repo_path, &self.anchor.sha)?;

    let plan = match resolve(&old_order, request)? {
      ResolvedRequest::Plan(input) => input.build(&fallback),
      ResolvedRequest::Split { sha, kind } => {
        let action = resolve_split(&self.git, &self.repo_path, &sha, &kind)?;
        build_split_plan(&old_order, &sha, action, &fallback)?
      }
    };

    self.execute(plan)
  }

  fn execute(&mut self, plan: RebasePlan) -> RewriteResult<RewriteOutcome> {
    let anchor = match plan.action {
      PlanAction::Noop => {
        info!("nothing to rewrite");
        self.anchor.clone()
      }
      PlanAction::ResetHard => {
        let Upstream::Commit(target) = &plan.upstream else {
          return Err(RewriteError::validation("cannot reset past the root commit"));
        };
        driver::reset_hard(&self.git, &self.repo_path, target, plan.surviving_count)?
      }
      PlanAction::Rebase => {
        let emitted = emit(&plan)?;
        driver::run(&self.git, &self.repo_path, &emitted, plan.surviving_count, &self.options)?
      }
    };

    self.anchor = anchor.clone();
    Ok(RewriteOutcome {
      action: plan.action,
      anchor,
    })
  }

  /// Move the branch to any commit. The anchor is kept; a warning is logged when it is no
  /// longer reachable from the new HEAD.
  #[instrument(skip(self))]
  pub fn reset_hard(&mut self, target: &str) -> RewriteResult<String> {
    self.ensure_ready()?;
    let sha = resolve_commit(&self.git, &self.repo_path, target)?;
    driver::reset_branch(&self.git, &self.repo_path, &sha)?;

    if !is_ancestor(&self.git, &self.repo_path, &self.anchor.sha, &sha)? {
      warn!(anchor = %short_sha(&self.anchor.sha), head = %short_sha(&sha), "anchor is not an ancestor of the new HEAD");
    }
    Ok(sha)
  }

  /// Return to the HEAD and anchor the session was opened with, discarding every rewrite
  /// and any rebase left in progress.
  #[instrument(skip(self))]
  pub fn failsafe_reset(&mut self) -> RewriteResult<()> {
    if is_rebase_in_progress(&self.git, &self.repo_path)? {
      driver::abort_rebase(&self.git, &self.repo_path, "failsafe reset")?;
    }
    driver::reset_branch(&self.git, &self.repo_path, &self.start.head)?;
    self.anchor = self.start.anchor.clone();
    info!(head = %short_sha(&self.start.head), "restored session start");
    Ok(())
  }

  /// Remember the current HEAD and anchor
  pub fn mark_best_commit(&mut self) -> RewriteResult<String> {
    let head = head_sha(&self.git, &self.repo_path)?;
    self.best = Some(Mark {
      head: head.clone(),
      anchor: self.anchor.clone(),
    });
    info!(head = %short_sha(&head), "marked best commit");
    Ok(head)
  }

  #[instrument(skip(self))]
  pub fn reset_to_best_commit(&mut self) -> RewriteResult<()> {
    let mark = self.best.clone().ok_or_else(|| RewriteError::validation("no best commit marked"))?;
    self.ensure_ready()?;
    driver::reset_branch(&self.git, &self.repo_path, &mark.head)?;
    self.anchor = mark.anchor;
    Ok(())
  }

  fn ensure_ready(&self) -> RewriteResult<()> {
    if is_rebase_in_progress(&self.git, &self.repo_path)? {
      return Err(RewriteError::validation("a rebase is already in progress; finish or abort it first"));
    }
    if has_uncommitted_changes(&self.git, &self.repo_path)? {
      return Err(RewriteError::validation("working tree has uncommitted changes; commit or stash them first"));
    }
    Ok(())
  }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
