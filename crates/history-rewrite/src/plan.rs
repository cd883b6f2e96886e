use crate::model::{RewriteError, RewriteResult, Upstream, short_sha};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

/// One line (or group of exec lines) of the rebase todo, oldest-first
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoStep {
  Pick(String),
  Squash(String),
  /// Replace the message of the commit just built
  AmendMessage { sha: String, message: String },
  /// After `sha` was picked, move `path` out of it into a follow-up commit
  MoveFileOut { sha: String, path: String },
  /// Apply one hunk of a split commit on top of HEAD and commit it
  ApplyHunk { patch: Vec<u8>, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
  /// Nothing changed
  Noop,
  /// Only trailing commits were dropped: move the branch to `upstream`
  ResetHard,
  /// Replay `steps` on top of `upstream`
  Rebase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebasePlan {
  pub action: PlanAction,
  pub upstream: Upstream,
  pub steps: Vec<TodoStep>,
  /// Commits in the display range once the plan has run
  pub surviving_count: usize,
}

/// Inputs of [`build_plan`], as produced from a user request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanInput {
  /// Display order before the rewrite, newest-first
  pub old_order: Vec<String>,
  /// Requested order, newest-first
  pub new_order: Vec<String>,
  pub rephrase: HashMap<String, String>,
  /// Commits emitted as `squash` into the commit preceding them
  pub squash_set: HashSet<String>,
}

impl PlanInput {
  pub fn build(&self, base_upstream: &Upstream) -> RebasePlan {
    build_plan(&self.old_order, &self.new_order, &self.rephrase, &self.squash_set, base_upstream)
  }
}

/// Compute the smallest rebase that turns `old_order` into `new_order`.
///
/// Both orders are newest-first. The longest oldest-first prefix that is identical in both
/// and neither rephrased nor squashed is left alone and its last commit becomes the upstream.
/// Without such a prefix the whole new order is replayed onto `base_upstream`.
/// Squash contiguity is not checked here. `new_order` must not be empty.
#[instrument(skip_all, fields(old = old_order.len(), new = new_order.len(), rephrase = rephrase.len(), squash = squash_set.len()))]
pub fn build_plan(
  old_order: &[String],
  new_order: &[String],
  rephrase: &HashMap<String, String>,
  squash_set: &HashSet<String>,
  base_upstream: &Upstream,
) -> RebasePlan {
  let old: Vec<&str> = old_order.iter().rev().map(String::as_str).collect();
  let new: Vec<&str> = new_order.iter().rev().map(String::as_str).collect();

  let touched = |sha: &str| rephrase.contains_key(sha) || squash_set.contains(sha);

  let mut common = old.iter().zip(new.iter()).take_while(|&(&o, &n)| o == n && !touched(o)).count();

  // a squash line needs the commit it folds into in the same todo
  if common > 0 && new.get(common).is_some_and(|sha| squash_set.contains(*sha)) {
    common -= 1;
  }

  let surviving_count = new.iter().filter(|sha| !squash_set.contains(**sha)).count();

  if common == 0 {
    debug!(upstream = %base_upstream, "no common prefix, replaying full range");
    return RebasePlan {
      action: PlanAction::Rebase,
      upstream: base_upstream.clone(),
      steps: replay_steps(&new, rephrase, squash_set),
      surviving_count,
    };
  }

  let upstream = Upstream::Commit(old[common - 1].to_string());
  let replay = &new[common..];

  let action = if !replay.is_empty() {
    PlanAction::Rebase
  } else if new.len() < old.len() {
    PlanAction::ResetHard
  } else {
    PlanAction::Noop
  };

  debug!(common, upstream = %upstream, replay = replay.len(), ?action, "computed common prefix");
  RebasePlan {
    action,
    upstream,
    steps: replay_steps(replay, rephrase, squash_set),
    surviving_count,
  }
}

fn replay_steps(replay: &[&str], rephrase: &HashMap<String, String>, squash_set: &HashSet<String>) -> Vec<TodoStep> {
  let mut steps = Vec::with_capacity(replay.len());
  for &sha in replay {
    if squash_set.contains(sha) {
      steps.push(TodoStep::Squash(sha.to_string()));
    } else {
      steps.push(TodoStep::Pick(sha.to_string()));
    }
    if let Some(message) = rephrase.get(sha) {
      steps.push(TodoStep::AmendMessage {
        sha: sha.to_string(),
        message: message.clone(),
      });
    }
  }
  steps
}

/// How a split rewrites its target commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitAction {
  MoveFileOut(String),
  /// One patch per hunk, in application order
  Hunks(Vec<Vec<u8>>),
}

/// Plan a split of `target`: only the target and the commits above it are replayed.
#[instrument(skip(old_order, action), fields(target = %short_sha(target)))]
pub fn build_split_plan(old_order: &[String], target: &str, action: SplitAction, base_upstream: &Upstream) -> RewriteResult<RebasePlan> {
  let index = old_order
    .iter()
    .position(|sha| sha == target)
    .ok_or_else(|| RewriteError::validation(format!("commit {} is not in the current range", short_sha(target))))?;

  let upstream = match old_order.get(index + 1) {
    Some(parent) => Upstream::Commit(parent.clone()),
    None => base_upstream.clone(),
  };

  let mut steps = Vec::with_capacity(index + 2);
  let surviving_count = match action {
    SplitAction::MoveFileOut(path) => {
      steps.push(TodoStep::Pick(target.to_string()));
      steps.push(TodoStep::MoveFileOut {
        sha: target.to_string(),
        path,
      });
      old_order.len() + 1
    }
    SplitAction::Hunks(patches) => {
      if patches.is_empty() {
        return Err(RewriteError::validation("no textual hunks found to split"));
      }
      let count = patches.len();
      for (i, patch) in patches.into_iter().enumerate() {
        steps.push(TodoStep::ApplyHunk {
          patch,
          message: format!("change-{} of {}", i + 1, short_sha(target)),
        });
      }
      old_order.len() - 1 + count
    }
  };

  steps.extend(old_order[..index].iter().rev().map(|sha| TodoStep::Pick(sha.clone())));

  Ok(RebasePlan {
    action: PlanAction::Rebase,
    upstream,
    steps,
    surviving_count,
  })
}

#[cfg(test)]
#[path = "plan_test.rs"]
mod tests;
