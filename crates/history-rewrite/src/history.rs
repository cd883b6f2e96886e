use crate::model::{CommitRecord, RewriteError, RewriteResult, Upstream, short_sha};
use anyhow::{Result, anyhow};
use git_executor::git_command_executor::GitCommandExecutor;
use tracing::{debug, instrument};

/// Fields are unit-separated, records are record-separated; the body goes last
/// because it is the only field that may span lines.
const RECORD_FORMAT: &str = "--pretty=format:%H%x1f%s%x1f%an <%ae>%x1f%at%x1f%P%x1f%B%x1e";

/// Expand any revision (abbreviated SHA, ref, `HEAD~2`) to a full commit SHA
#[instrument(skip(git))]
pub fn resolve_commit(git: &GitCommandExecutor, repo_path: &str, rev: &str) -> RewriteResult<String> {
  let revision = format!("{rev}^{{commit}}");
  git
    .execute_command(&["rev-parse", "--verify", "--quiet", &revision], repo_path)
    .map_err(|e| RewriteError::RepositoryQuery(anyhow!("cannot resolve commit '{rev}': {e}")))
}

#[instrument(skip(git))]
pub fn has_parent(git: &GitCommandExecutor, repo_path: &str, sha: &str) -> RewriteResult<bool> {
  let parent = format!("{sha}^");
  let (_, exit_code) = git
    .execute_command_with_status(&["rev-parse", "--verify", "--quiet", &parent], repo_path)
    .map_err(RewriteError::RepositoryQuery)?;
  Ok(exit_code == 0)
}

/// Where a full replay of the range starting at `base_sha` has to begin
pub fn base_upstream(git: &GitCommandExecutor, repo_path: &str, base_sha: &str) -> RewriteResult<Upstream> {
  if has_parent(git, repo_path, base_sha)? {
    Ok(Upstream::Commit(resolve_commit(git, repo_path, &format!("{base_sha}^"))?))
  } else {
    Ok(Upstream::Root)
  }
}

/// First commit reachable from HEAD; the default base when none is given
#[instrument(skip(git))]
pub fn root_commit(git: &GitCommandExecutor, repo_path: &str) -> RewriteResult<String> {
  let roots = git
    .execute_command_lines(&["rev-list", "--max-parents=0", "HEAD"], repo_path)
    .map_err(|e| RewriteError::RepositoryQuery(anyhow!("failed to find root commit: {e}")))?;
  roots
    .into_iter()
    .next()
    .ok_or_else(|| RewriteError::RepositoryQuery(anyhow!("repository has no commits")))
}

/// Commits from HEAD down to and including `base_sha`, newest-first.
/// The range must be linear and `base_sha` must be an ancestor of HEAD.
#[instrument(skip(git))]
pub fn read_range(git: &GitCommandExecutor, repo_path: &str, base_sha: &str) -> RewriteResult<Vec<CommitRecord>> {
  let base = resolve_commit(git, repo_path, base_sha)?;

  let range = if has_parent(git, repo_path, &base)? {
    format!("{base}^..HEAD")
  } else {
    String::from("HEAD")
  };

  let output = git
    .execute_command_raw(&["--no-pager", "log", RECORD_FORMAT, &range], repo_path)
    .map_err(|e| RewriteError::RepositoryQuery(anyhow!("failed to fetch git history: {e}")))?;

  let mut commits = Vec::new();
  for record in output.split('\u{1e}') {
    let record = record.trim_start_matches(['\n', '\r']);
    if record.trim().is_empty() {
      continue;
    }
    let (commit, parent_count) = parse_commit_record(record).map_err(RewriteError::RepositoryQuery)?;
    if parent_count > 1 {
      return Err(RewriteError::RepositoryQuery(anyhow!(
        "range {range} contains merge commit {}; only linear history can be rewritten",
        commit.short_sha()
      )));
    }
    commits.push(commit);
  }

  match commits.last() {
    Some(bottom) if bottom.sha == base => {}
    _ => {
      return Err(RewriteError::RepositoryQuery(anyhow!(
        "base commit {} is not an ancestor of HEAD",
        short_sha(&base)
      )));
    }
  }

  debug!(commits_count = commits.len(), range = %range, "read history range");
  Ok(commits)
}

/// Parse one record of [`RECORD_FORMAT`]; also returns the number of parents
pub fn parse_commit_record(record: &str) -> Result<(CommitRecord, usize)> {
  let mut fields = record.splitn(6, '\x1f');

  let sha = fields.next().ok_or_else(|| anyhow!("Missing commit ID field"))?;
  let subject = fields.next().ok_or_else(|| anyhow!("Missing subject field"))?;
  let author = fields.next().ok_or_else(|| anyhow!("Missing author field"))?;
  let timestamp_field = fields.next().ok_or_else(|| anyhow!("Missing author timestamp field"))?;
  let parents = fields.next().ok_or_else(|| anyhow!("Missing parents field"))?;
  let body = fields.next().ok_or_else(|| anyhow!("Missing message field"))?;

  let timestamp = timestamp_field
    .trim()
    .parse::<i64>()
    .map_err(|e| anyhow!("Failed to parse author timestamp '{}': {}", timestamp_field, e))?;

  let commit = CommitRecord {
    sha: sha.trim().to_string(),
    short_message: subject.to_string(),
    full_message: body.trim().to_string(),
    author: author.to_string(),
    timestamp,
  };
  Ok((commit, parents.split_whitespace().count()))
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
