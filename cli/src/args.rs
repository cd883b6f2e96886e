use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Reorder, drop, squash, rephrase and split commits via git rebase -i", long_about = None)]
pub struct Cli {
  /// Repository to operate on
  #[arg(short = 'C', long = "repo", env = "REBASE_DECK_REPO", default_value = ".")]
  pub repo: PathBuf,

  /// Oldest commit in scope; defaults to the root commit
  #[arg(long)]
  pub base: Option<String>,

  /// git binary to run instead of the one found on PATH
  #[arg(long = "git", env = "REBASE_DECK_GIT")]
  pub git_path: Option<String>,

  /// Deadline for a single rebase in seconds, 0 waits forever
  #[arg(long, env = "REBASE_DECK_TIMEOUT_SECS", default_value_t = 600)]
  pub timeout_secs: u64,

  #[command(subcommand)]
  pub command: Command,
}

impl Cli {
  pub fn rebase_timeout(&self) -> Option<Duration> {
    (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
  }
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List commits from HEAD down to the base, newest first
  Log {
    #[arg(long)]
    json: bool,
  },
  /// Show metadata, message and diff of a commit
  Show {
    sha: String,
    /// Only show the diff of this file
    #[arg(long)]
    path: Option<String>,
  },
  /// Rewrite history into the given order (newest first, every commit listed once)
  Reorder {
    #[arg(required = true, num_args = 1..)]
    shas: Vec<String>,
  },
  /// Move a commit to a display position (0 is the top)
  Move { sha: String, position: usize },
  /// Remove a commit
  Drop { sha: String },
  /// Collapse adjacent commits into the oldest of them
  Squash {
    #[arg(required = true, num_args = 2..)]
    shas: Vec<String>,
    #[command(flatten)]
    message: MessageArgs,
  },
  /// Squash a commit with its neighbour above or below
  SquashWith {
    sha: String,
    #[command(flatten)]
    side: SideArgs,
    #[command(flatten)]
    message: MessageArgs,
  },
  /// Replace the message of a commit
  Rephrase {
    sha: String,
    #[command(flatten)]
    message: MessageArgs,
  },
  /// Move one file's changes into a new commit right after the original
  SplitFile { sha: String, path: String },
  /// Turn a single-file commit into one commit per hunk
  SplitHunks { sha: String },
  /// Hard-reset the current branch to a commit
  Reset { sha: String },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct MessageArgs {
  /// Commit message
  #[arg(short, long)]
  pub message: Option<String>,

  /// Read the commit message from a file
  #[arg(short = 'F', long)]
  pub file: Option<PathBuf>,
}

impl MessageArgs {
  pub fn read(&self) -> Result<String> {
    match (&self.message, &self.file) {
      (Some(message), _) => Ok(message.clone()),
      (None, Some(path)) => std::fs::read_to_string(path).with_context(|| format!("failed to read message file {}", path.display())),
      (None, None) => Ok(String::new()),
    }
  }
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SideArgs {
  /// Squash with the newer neighbour
  #[arg(long)]
  pub above: bool,

  /// Squash with the older neighbour
  #[arg(long)]
  pub below: bool,
}

#[cfg(test)]
#[path = "args_test.rs"]
mod tests;
