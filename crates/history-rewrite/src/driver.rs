use crate::emit::EmittedPlan;
use crate::history::resolve_commit;
use crate::model::{BaseAnchor, RewriteError, RewriteOptions, RewriteResult, short_sha};
use crate::repo_info::is_rebase_in_progress;
use anyhow::anyhow;
use git_executor::git_command_executor::GitCommandExecutor;
use tracing::{error, info, instrument, warn};

/// Run `git rebase -i` with the emitted todo and return the new anchor.
///
/// Any non-zero exit or an expired deadline aborts the rebase before the error is returned.
/// When the abort itself leaves rebase state behind, [`RewriteError::AbortFailed`] is returned
/// instead of the original failure, so callers never mistake a stuck rebase for a rollback.
#[instrument(skip(git, emitted, options), fields(upstream = %emitted.upstream))]
pub fn run(
  git: &GitCommandExecutor,
  repo_path: &str,
  emitted: &EmittedPlan,
  surviving_count: usize,
  options: &RewriteOptions,
) -> RewriteResult<BaseAnchor> {
  let args = ["rebase", "-i", "--autosquash", emitted.upstream.rebase_arg()];
  let env_vars = [("GIT_SEQUENCE_EDITOR", emitted.sequence_editor.as_str()), ("GIT_EDITOR", "true")];

  let outcome = match git.execute_command_with_timeout(&args, repo_path, &env_vars, options.rebase_timeout) {
    Ok(outcome) => outcome,
    Err(e) => {
      // waiting can fail after the rebase already started
      if is_rebase_in_progress(git, repo_path)? {
        abort_rebase(git, repo_path, &e.to_string())?;
      }
      return Err(RewriteError::Git(e));
    }
  };

  if outcome.timed_out {
    let after = options.rebase_timeout.unwrap_or_default();
    abort_rebase(git, repo_path, &format!("rebase killed after {}s", after.as_secs()))?;
    return Err(RewriteError::TimedOut { after });
  }

  if !outcome.success() || is_rebase_in_progress(git, repo_path)? {
    let stderr = if outcome.stderr.trim().is_empty() { outcome.stdout } else { outcome.stderr };
    abort_rebase(git, repo_path, stderr.trim())?;
    return Err(RewriteError::RewriteConflict {
      upstream: emitted.upstream.to_string(),
      stderr,
    });
  }

  let anchor = anchor_from_head(git, repo_path, surviving_count)?;
  info!(anchor = %short_sha(&anchor.sha), "rebase completed");
  Ok(anchor)
}

/// Move the branch to `target` without replaying anything
#[instrument(skip(git), fields(target = %short_sha(target)))]
pub fn reset_hard(git: &GitCommandExecutor, repo_path: &str, target: &str, surviving_count: usize) -> RewriteResult<BaseAnchor> {
  reset_branch(git, repo_path, target)?;
  let anchor = anchor_from_head(git, repo_path, surviving_count)?;
  info!(anchor = %short_sha(&anchor.sha), "branch reset");
  Ok(anchor)
}

/// `git reset --hard`: moves the current branch (or detached HEAD) and the working tree
pub fn reset_branch(git: &GitCommandExecutor, repo_path: &str, target: &str) -> RewriteResult<()> {
  git
    .execute_command(&["reset", "-q", "--hard", target], repo_path)
    .map(|_| ())
    .map_err(RewriteError::Git)
}

/// The commit `surviving_count - 1` steps below HEAD
pub fn anchor_from_head(git: &GitCommandExecutor, repo_path: &str, surviving_count: usize) -> RewriteResult<BaseAnchor> {
  let steps_back = surviving_count
    .checked_sub(1)
    .ok_or_else(|| RewriteError::Git(anyhow!("a rewrite must leave at least one commit")))?;
  let sha = resolve_commit(git, repo_path, &format!("HEAD~{steps_back}"))?;
  Ok(BaseAnchor::new(sha))
}

/// `git rebase --abort`, then confirm the rebase state is gone. `reason` describes what
/// made the abort necessary and is carried into the error when the state remains.
pub fn abort_rebase(git: &GitCommandExecutor, repo_path: &str, reason: &str) -> RewriteResult<()> {
  let stderr = match git.execute_command_with_status(&["rebase", "--abort"], repo_path) {
    Ok((_, 0)) => String::new(),
    Ok((stderr, code)) => {
      warn!(exit_code = code, stderr = %stderr, "rebase --abort exited non-zero");
      stderr
    }
    Err(e) => {
      warn!(error = %e, "failed to run rebase --abort");
      e.to_string()
    }
  };

  if is_rebase_in_progress(git, repo_path)? {
    error!(reason, stderr = %stderr, "rebase state left behind after abort");
    return Err(RewriteError::AbortFailed {
      reason: reason.to_string(),
      stderr,
    });
  }
  info!("rebase aborted");
  Ok(())
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod tests;
