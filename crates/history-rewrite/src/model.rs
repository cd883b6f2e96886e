use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One commit of the display range, as read by the history reader.
/// Never mutated; the whole list is re-read after each rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
  pub sha: String,
  pub short_message: String,
  pub full_message: String,
  /// `Name <email>`
  pub author: String,
  /// Author time, seconds since epoch
  pub timestamp: i64,
}

impl CommitRecord {
  pub fn short_sha(&self) -> &str {
    short_sha(&self.sha)
  }
}

pub fn short_sha(sha: &str) -> &str {
  &sha[..sha.len().min(8)]
}

/// Oldest commit still in scope for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAnchor {
  pub sha: String,
}

impl BaseAnchor {
  pub fn new(sha: impl Into<String>) -> Self {
    Self { sha: sha.into() }
  }
}

/// Commit below which a rebase leaves history untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Upstream {
  Commit(String),
  /// Base commit has no parent: `git rebase --root`
  Root,
}

impl Upstream {
  /// Arguments appended to `git rebase -i`
  pub fn rebase_arg(&self) -> &str {
    match self {
      Upstream::Commit(sha) => sha,
      Upstream::Root => "--root",
    }
  }
}

impl fmt::Display for Upstream {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Upstream::Commit(sha) => write!(f, "{}", short_sha(sha)),
      Upstream::Root => write!(f, "<root>"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitKind {
  /// Move one file's changes into a new commit right after the original
  MoveFileOut(String),
  /// Explode a single-file commit into one commit per diff hunk
  Hunks,
}

/// What the user asked for. SHAs are full or abbreviated ids of commits in the display range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewriteRequest {
  /// Complete new order, newest-first
  Reorder(Vec<String>),
  Drop(String),
  /// At least two contiguous commits, collapsed into the oldest one
  Squash { shas: Vec<String>, message: String },
  Rephrase { sha: String, message: String },
  Split { sha: String, kind: SplitKind },
}

impl RewriteRequest {
  /// Short operation name used in logs and error messages
  pub fn operation(&self) -> &'static str {
    match self {
      RewriteRequest::Reorder(_) => "reorder",
      RewriteRequest::Drop(_) => "drop",
      RewriteRequest::Squash { .. } => "squash",
      RewriteRequest::Rephrase { .. } => "rephrase",
      RewriteRequest::Split { kind: SplitKind::MoveFileOut(_), .. } => "split-file",
      RewriteRequest::Split { kind: SplitKind::Hunks, .. } => "split-hunks",
    }
  }
}

/// Knobs for a rewrite session
#[derive(Debug, Clone)]
pub struct RewriteOptions {
  /// Deadline for one `git rebase` invocation; `None` waits forever
  pub rebase_timeout: Option<Duration>,
}

pub const DEFAULT_REBASE_TIMEOUT: Duration = Duration::from_secs(600);

impl Default for RewriteOptions {
  fn default() -> Self {
    Self {
      rebase_timeout: Some(DEFAULT_REBASE_TIMEOUT),
    }
  }
}

/// Error taxonomy for history rewriting.
/// Every variant except `Git` and `AbortFailed` guarantees the repository was left as it was found.
#[derive(Debug)]
pub enum RewriteError {
  /// A read-only query failed; nothing was mutated
  RepositoryQuery(anyhow::Error),
  /// `git rebase` exited non-zero and was aborted
  RewriteConflict { upstream: String, stderr: String },
  /// `git rebase` exceeded its deadline and was aborted
  TimedOut { after: Duration },
  /// `git rebase` failed and `git rebase --abort` left its state behind: the repository is
  /// still mid-rebase and needs manual recovery (or a failsafe reset)
  AbortFailed { reason: String, stderr: String },
  /// A mutating command outside the rebase (reset) failed
  Git(anyhow::Error),
  /// Rejected before any subprocess was spawned
  Validation(String),
  Io(std::io::Error),
}

impl RewriteError {
  pub fn validation(message: impl Into<String>) -> Self {
    RewriteError::Validation(message.into())
  }
}

impl From<std::io::Error> for RewriteError {
  fn from(err: std::io::Error) -> Self {
    RewriteError::Io(err)
  }
}

impl fmt::Display for RewriteError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RewriteError::RepositoryQuery(e) => write!(f, "repository query failed: {e}"),
      RewriteError::RewriteConflict { upstream, stderr } => {
        write!(f, "rebase onto {upstream} failed (likely a merge conflict) and was aborted: {}", stderr.trim())
      }
      RewriteError::TimedOut { after } => write!(f, "rebase did not finish within {}s and was aborted", after.as_secs()),
      RewriteError::AbortFailed { reason, stderr } => write!(
        f,
        "rebase failed ({reason}) and could not be aborted, the repository is still mid-rebase: {}",
        stderr.trim()
      ),
      RewriteError::Git(e) => write!(f, "git command failed: {e}"),
      RewriteError::Validation(msg) => write!(f, "invalid request: {msg}"),
      RewriteError::Io(e) => write!(f, "I/O error: {e}"),
    }
  }
}

impl std::error::Error for RewriteError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      RewriteError::RepositoryQuery(e) | RewriteError::Git(e) => Some(&**e),
      RewriteError::Io(e) => Some(e),
      _ => None,
    }
  }
}

pub type RewriteResult<T> = Result<T, RewriteError>;
