use crate::args::{Cli, Command};
use anyhow::{Context, Result, anyhow};
use git_executor::git_command_executor::GitCommandExecutor;
use history_rewrite::history::resolve_commit;
use history_rewrite::model::short_sha;
use history_rewrite::plan::PlanAction;
use history_rewrite::repo_info::{commit_diff, commit_metadata, current_branch, file_diff_in_commit, full_message, head_short_sha};
use history_rewrite::request::{move_to, squash_with_above, squash_with_below};
use history_rewrite::{RewriteOptions, RewriteRequest, RewriteSession, SplitKind};

pub fn run(cli: Cli) -> Result<()> {
  let repo_path = cli.repo.to_str().ok_or_else(|| anyhow!("repository path {} is not valid UTF-8", cli.repo.display()))?.to_string();

  let git = match &cli.git_path {
    Some(path) => GitCommandExecutor::with_git_path(path)?,
    None => GitCommandExecutor::new(),
  };
  git.get_info()?.validate_minimum_version().map_err(|e| anyhow!(e))?;

  let options = RewriteOptions {
    rebase_timeout: cli.rebase_timeout(),
  };
  let mut session = RewriteSession::open(git, &repo_path, cli.base.as_deref(), options).with_context(|| format!("failed to open {repo_path}"))?;

  match cli.command {
    Command::Log { json } => print_log(&session, json),
    Command::Show { sha, path } => show(&session, &sha, path.as_deref()),
    Command::Reorder { shas } => rewrite(&mut session, RewriteRequest::Reorder(shas)),
    Command::Move { sha, position } => {
      let request = move_to(&session.display_order()?, &sha, position)?;
      rewrite(&mut session, request)
    }
    Command::Drop { sha } => rewrite(&mut session, RewriteRequest::Drop(sha)),
    Command::Squash { shas, message } => {
      let message = message.read()?;
      rewrite(&mut session, RewriteRequest::Squash { shas, message })
    }
    Command::SquashWith { sha, side, message } => {
      let message = message.read()?;
      let order = session.display_order()?;
      let request = if side.above {
        squash_with_above(&order, &sha, &message)?
      } else {
        squash_with_below(&order, &sha, &message)?
      };
      rewrite(&mut session, request)
    }
    Command::Rephrase { sha, message } => {
      let message = message.read()?;
      rewrite(&mut session, RewriteRequest::Rephrase { sha, message })
    }
    Command::SplitFile { sha, path } => rewrite(
      &mut session,
      RewriteRequest::Split {
        sha,
        kind: SplitKind::MoveFileOut(path),
      },
    ),
    Command::SplitHunks { sha } => rewrite(&mut session, RewriteRequest::Split { sha, kind: SplitKind::Hunks }),
    Command::Reset { sha } => {
      let head = session.reset_hard(&sha).with_context(|| format!("reset to {sha} failed"))?;
      println!("HEAD is now at {}", short_sha(&head));
      Ok(())
    }
  }
}

fn rewrite(session: &mut RewriteSession, request: RewriteRequest) -> Result<()> {
  let operation = request.operation();
  let outcome = session.apply(&request).with_context(|| format!("{operation} failed"))?;

  match outcome.action {
    PlanAction::Noop => println!("nothing to rewrite"),
    PlanAction::ResetHard => println!("{operation}: branch reset, base is {}", short_sha(&outcome.anchor.sha)),
    PlanAction::Rebase => println!("{operation}: history rewritten, base is {}", short_sha(&outcome.anchor.sha)),
  }
  print_log(session, false)
}

fn print_log(session: &RewriteSession, json: bool) -> Result<()> {
  let commits = session.history().context("failed to read history")?;
  if json {
    println!("{}", serde_json::to_string_pretty(&commits)?);
    return Ok(());
  }

  let git = session.git();
  let branch = current_branch(git, session.repo_path())?;
  let head = head_short_sha(git, session.repo_path())?;
  println!("On {branch} at {head}");
  for commit in &commits {
    println!("{} {}  ({})", commit.short_sha(), commit.short_message, commit.author);
  }
  Ok(())
}

fn show(session: &RewriteSession, rev: &str, path: Option<&str>) -> Result<()> {
  let git = session.git();
  let repo_path = session.repo_path();
  let sha = resolve_commit(git, repo_path, rev)?;

  println!("commit {sha}");
  println!("{}", commit_metadata(git, repo_path, &sha)?);
  println!();
  for line in full_message(git, repo_path, &sha)?.lines() {
    println!("    {line}");
  }
  println!();
  let diff = match path {
    Some(path) => file_diff_in_commit(git, repo_path, &sha, path)?,
    None => commit_diff(git, repo_path, &sha)?,
  };
  print!("{diff}");
  Ok(())
}
