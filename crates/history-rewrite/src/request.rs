//! Turns a [`RewriteRequest`] into planner input, rejecting anything git should never see.

use crate::history::has_parent;
use crate::hunks::split_into_hunk_patches;
use crate::model::{RewriteError, RewriteRequest, RewriteResult, SplitKind, short_sha};
use crate::plan::{PlanInput, SplitAction};
use crate::repo_info::{commit_files, file_patch_in_commit};
use git_executor::git_command_executor::GitCommandExecutor;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRequest {
  Plan(PlanInput),
  /// Needs repository queries before it can be planned, see [`resolve_split`]
  Split { sha: String, kind: SplitKind },
}

/// Expand a full or abbreviated SHA to the matching commit of `old_order`
pub fn match_sha(old_order: &[String], sha: &str) -> RewriteResult<String> {
  let sha = sha.trim();
  if sha.is_empty() {
    return Err(RewriteError::validation("empty commit id"));
  }

  let mut matches = old_order.iter().filter(|candidate| candidate.starts_with(sha));
  match (matches.next(), matches.next()) {
    (Some(found), None) => Ok(found.clone()),
    (Some(_), Some(_)) => Err(RewriteError::validation(format!("commit id {sha} is ambiguous"))),
    (None, _) => Err(RewriteError::validation(format!("commit {sha} is not in the current range"))),
  }
}

fn require_message(message: &str) -> RewriteResult<()> {
  if message.trim().is_empty() {
    Err(RewriteError::validation("commit message must not be blank"))
  } else {
    Ok(())
  }
}

#[instrument(skip(old_order), fields(old = old_order.len(), operation = request.operation()))]
pub fn resolve(old_order: &[String], request: &RewriteRequest) -> RewriteResult<ResolvedRequest> {
  let unchanged = || PlanInput {
    old_order: old_order.to_vec(),
    new_order: old_order.to_vec(),
    ..PlanInput::default()
  };

  let input = match request {
    RewriteRequest::Reorder(requested) => PlanInput {
      new_order: resolve_permutation(old_order, requested)?,
      ..unchanged()
    },

    RewriteRequest::Drop(sha) => {
      let target = match_sha(old_order, sha)?;
      let new_order: Vec<String> = old_order.iter().filter(|s| **s != target).cloned().collect();
      if new_order.is_empty() {
        return Err(RewriteError::validation("cannot drop every commit in the range"));
      }
      PlanInput { new_order, ..unchanged() }
    }

    RewriteRequest::Squash { shas, message } => {
      require_message(message)?;
      let (target, squashed) = resolve_squash_group(old_order, shas)?;
      // the squash lines run oldest-first, so the newest member is the last one folded in
      let newest = squashed.first().cloned().unwrap_or_else(|| target.clone());
      debug!(target = %short_sha(&target), members = squashed.len() + 1, "resolved squash group");
      PlanInput {
        rephrase: HashMap::from([(newest, message.clone())]),
        squash_set: squashed.into_iter().collect(),
        ..unchanged()
      }
    }

    RewriteRequest::Rephrase { sha, message } => {
      require_message(message)?;
      let target = match_sha(old_order, sha)?;
      PlanInput {
        rephrase: HashMap::from([(target, message.clone())]),
        ..unchanged()
      }
    }

    RewriteRequest::Split { sha, kind } => {
      return Ok(ResolvedRequest::Split {
        sha: match_sha(old_order, sha)?,
        kind: kind.clone(),
      });
    }
  };

  Ok(ResolvedRequest::Plan(input))
}

fn resolve_permutation(old_order: &[String], requested: &[String]) -> RewriteResult<Vec<String>> {
  let mut seen = HashSet::with_capacity(requested.len());
  let mut new_order = Vec::with_capacity(requested.len());
  for sha in requested {
    let full = match_sha(old_order, sha)?;
    if !seen.insert(full.clone()) {
      return Err(RewriteError::validation(format!("commit {} listed twice", short_sha(&full))));
    }
    new_order.push(full);
  }

  if new_order.len() != old_order.len() {
    return Err(RewriteError::validation(format!(
      "reorder must list all {} commits of the range, got {}",
      old_order.len(),
      new_order.len()
    )));
  }
  Ok(new_order)
}

/// Returns the oldest member (kept as `pick`) and the rest newest-first (emitted as `squash`).
/// Members must be adjacent in `old_order`.
fn resolve_squash_group(old_order: &[String], shas: &[String]) -> RewriteResult<(String, Vec<String>)> {
  let mut positions = Vec::with_capacity(shas.len());
  for sha in shas {
    let full = match_sha(old_order, sha)?;
    let position = old_order.iter().position(|s| *s == full).unwrap_or_default();
    if !positions.contains(&position) {
      positions.push(position);
    }
  }

  if positions.len() < 2 {
    return Err(RewriteError::validation("squash needs at least two distinct commits"));
  }

  positions.sort_unstable();
  let (first, last) = (positions[0], positions[positions.len() - 1]);
  if last - first + 1 != positions.len() {
    return Err(RewriteError::validation("squashed commits must be adjacent in history"));
  }

  let target = old_order[last].clone();
  let squashed = positions[..positions.len() - 1].iter().map(|&i| old_order[i].clone()).collect();
  Ok((target, squashed))
}

/// Squash `sha` with the commit displayed above it (its newer neighbour)
pub fn squash_with_above(old_order: &[String], sha: &str, message: &str) -> RewriteResult<RewriteRequest> {
  let target = match_sha(old_order, sha)?;
  let index = old_order.iter().position(|s| *s == target).unwrap_or_default();
  if index == 0 {
    return Err(RewriteError::validation(format!("commit {} has no commit above it", short_sha(&target))));
  }
  Ok(RewriteRequest::Squash {
    shas: vec![old_order[index - 1].clone(), target],
    message: message.to_string(),
  })
}

/// Squash `sha` with the commit displayed below it (its older neighbour)
pub fn squash_with_below(old_order: &[String], sha: &str, message: &str) -> RewriteResult<RewriteRequest> {
  let target = match_sha(old_order, sha)?;
  let index = old_order.iter().position(|s| *s == target).unwrap_or_default();
  let below = old_order
    .get(index + 1)
    .ok_or_else(|| RewriteError::validation(format!("commit {} has no commit below it", short_sha(&target))))?;
  Ok(RewriteRequest::Squash {
    shas: vec![target, below.clone()],
    message: message.to_string(),
  })
}

/// Reorder that moves `sha` to display `position` (0 is the top)
pub fn move_to(old_order: &[String], sha: &str, position: usize) -> RewriteResult<RewriteRequest> {
  let target = match_sha(old_order, sha)?;
  if position >= old_order.len() {
    return Err(RewriteError::validation(format!(
      "position {position} is outside the range of {} commits",
      old_order.len()
    )));
  }

  let mut new_order: Vec<String> = old_order.iter().filter(|s| **s != target).cloned().collect();
  new_order.insert(position, target);
  Ok(RewriteRequest::Reorder(new_order))
}

/// Check split preconditions against the repository and compute what the rewrite replays
#[instrument(skip(git, kind), fields(sha = %short_sha(sha)))]
pub fn resolve_split(git: &GitCommandExecutor, repo_path: &str, sha: &str, kind: &SplitKind) -> RewriteResult<SplitAction> {
  if !has_parent(git, repo_path, sha)? {
    return Err(RewriteError::validation("the root commit cannot be split"));
  }

  let files = commit_files(git, repo_path, sha)?;
  match kind {
    SplitKind::MoveFileOut(path) => {
      if !files.iter().any(|f| f == path) {
        return Err(RewriteError::validation(format!("commit {} does not touch {path}", short_sha(sha))));
      }
      if files.len() < 2 {
        return Err(RewriteError::validation(format!(
          "{path} is the only file of commit {}; nothing would remain",
          short_sha(sha)
        )));
      }
      Ok(SplitAction::MoveFileOut(path.clone()))
    }

    SplitKind::Hunks => {
      let [path] = files.as_slice() else {
        return Err(RewriteError::validation(format!(
          "hunk split needs a commit touching exactly one file, {} touches {}",
          short_sha(sha),
          files.len()
        )));
      };
      let diff = file_patch_in_commit(git, repo_path, sha, path)?;
      let patches = split_into_hunk_patches(&diff).map_err(|e| RewriteError::validation(format!("cannot split {path}: {e}")))?;
      if patches.is_empty() {
        return Err(RewriteError::validation(format!("{path} has no textual hunks to split")));
      }
      debug!(hunks = patches.len(), path = %path, "hunk split resolved");
      Ok(SplitAction::Hunks(patches))
    }
  }
}

#[cfg(test)]
#[path = "request_test.rs"]
mod tests;
