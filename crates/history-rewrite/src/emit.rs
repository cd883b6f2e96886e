//! Serializes a [`RebasePlan`] into a todo file plus the message and patch files its
//! `exec` lines refer to. Git is pointed at the todo through a fixed `cp` command used as
//! the sequence editor, so nothing is generated as code at runtime.

use crate::model::{RewriteError, RewriteResult, Upstream};
use crate::plan::{RebasePlan, TodoStep};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, instrument};

pub const TODO_FILE_NAME: &str = "git-rebase-todo";

/// Files backing one rebase; removed when dropped, whatever the outcome
#[derive(Debug)]
pub struct EmittedPlan {
  pub work_dir: TempDir,
  pub todo_path: PathBuf,
  /// Value for `GIT_SEQUENCE_EDITOR`
  pub sequence_editor: String,
  pub upstream: Upstream,
}

/// Todo text plus auxiliary files, before anything touches the disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTodo {
  pub todo: String,
  pub files: Vec<(PathBuf, Vec<u8>)>,
}

/// Quote for POSIX `sh`: the whole value in single quotes, embedded quotes as `'\''`
pub fn shell_quote(value: &str) -> String {
  format!("'{}'", value.replace('\'', "'\\''"))
}

/// Render the todo for `plan` with auxiliary files placed in `dir`.
/// Same plan and directory, same output.
pub fn render_todo(plan: &RebasePlan, dir: &Path) -> RenderedTodo {
  let mut lines = Vec::with_capacity(plan.steps.len());
  let mut files = Vec::new();
  let mut message_index = 0;
  let mut hunk_index = 0;

  for step in &plan.steps {
    match step {
      TodoStep::Pick(sha) => lines.push(format!("pick {sha}")),
      TodoStep::Squash(sha) => lines.push(format!("squash {sha}")),
      TodoStep::AmendMessage { message, .. } => {
        message_index += 1;
        let path = dir.join(format!("message-{message_index}.txt"));
        lines.push(format!("exec git commit -q --amend -F {}", shell_quote(&path.to_string_lossy())));
        files.push((path, with_trailing_newline(message).into_bytes()));
      }
      TodoStep::MoveFileOut { sha, path } => {
        let file = shell_quote(path);
        let moved_message = shell_quote(&format!("{path} changes moved out of below commit"));
        lines.push(format!(
          "exec git reset -q --soft HEAD~1 && git reset -q HEAD -- {file} && git commit -q -C {sha} && git add --all -- {file} && git commit -q -m {moved_message}"
        ));
      }
      TodoStep::ApplyHunk { patch, message } => {
        hunk_index += 1;
        let path = dir.join(format!("hunk-{hunk_index}.patch"));
        lines.push(format!(
          "exec git apply --index {} && git commit -q -m {}",
          shell_quote(&path.to_string_lossy()),
          shell_quote(message)
        ));
        files.push((path, patch.clone()));
      }
    }
  }

  let mut todo = lines.join("\n");
  todo.push('\n');
  RenderedTodo { todo, files }
}

fn with_trailing_newline(text: &str) -> String {
  if text.ends_with('\n') { text.to_string() } else { format!("{text}\n") }
}

/// Write the plan into a fresh temporary directory
#[instrument(skip(plan), fields(upstream = %plan.upstream, steps = plan.steps.len()))]
pub fn emit(plan: &RebasePlan) -> RewriteResult<EmittedPlan> {
  if plan.steps.is_empty() {
    return Err(RewriteError::validation("nothing to replay"));
  }

  let work_dir = tempfile::Builder::new().prefix("rebase-deck-").tempdir()?;
  let rendered = render_todo(plan, work_dir.path());

  for (path, content) in &rendered.files {
    fs::write(path, content)?;
  }
  let todo_path = work_dir.path().join(TODO_FILE_NAME);
  fs::write(&todo_path, &rendered.todo)?;

  let sequence_editor = format!("cp {}", shell_quote(&todo_path.to_string_lossy()));
  debug!(todo = %rendered.todo.trim_end(), aux_files = rendered.files.len(), "emitted rebase todo");

  Ok(EmittedPlan {
    work_dir,
    todo_path,
    sequence_editor,
    upstream: plan.upstream.clone(),
  })
}

#[cfg(test)]
#[path = "emit_test.rs"]
mod tests;
