use git_executor::git_command_executor::GitCommandExecutor;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// Constants for test Git user configuration
const TEST_USER_NAME: &str = "Test User";
const TEST_USER_EMAIL: &str = "test@example.com";

/// Git test repository wrapper with helper methods
pub struct TestRepo {
  dir: TempDir,
  git_executor: GitCommandExecutor,
}

impl Default for TestRepo {
  fn default() -> Self {
    Self::new()
  }
}

impl TestRepo {
  /// Creates a new test repository on branch `master`
  pub fn new() -> Self {
    let dir = tempfile::tempdir().unwrap();
    let git_executor = GitCommandExecutor::new();
    let repo_path = dir.path().to_str().unwrap();

    git_executor
      .execute_command(&["init", "-q"], repo_path)
      .unwrap_or_else(|e| panic!("Git init failed: {}", e));
    git_executor.execute_command(&["symbolic-ref", "HEAD", "refs/heads/master"], repo_path).unwrap();

    Self::configure_git_user(&git_executor, repo_path).unwrap();
    // keep rebases in tests independent of the developer's global config
    git_executor.execute_command(&["config", "commit.gpgsign", "false"], repo_path).unwrap();
    git_executor.execute_command(&["config", "rebase.autoStash", "false"], repo_path).unwrap();
    git_executor.execute_command(&["config", "core.autocrlf", "false"], repo_path).unwrap();

    Self { dir, git_executor }
  }

  /// Repository with `count` commits, each adding its own file `file{i}.txt`
  /// with subject `Commit {i}`. Returns SHAs oldest-first.
  pub fn with_linear_history(count: usize) -> (Self, Vec<String>) {
    let repo = Self::new();
    let shas = (1..=count)
      .map(|i| repo.create_commit(&format!("Commit {i}"), &format!("file{i}.txt"), &format!("content {i}\n")))
      .collect();
    (repo, shas)
  }

  pub fn path(&self) -> &Path {
    self.dir.path()
  }

  pub fn path_str(&self) -> &str {
    self.dir.path().to_str().unwrap()
  }

  fn configure_git_user(git_executor: &GitCommandExecutor, repo_path: &str) -> Result<(), anyhow::Error> {
    git_executor.execute_command(&["config", "user.name", TEST_USER_NAME], repo_path)?;
    git_executor.execute_command(&["config", "user.email", TEST_USER_EMAIL], repo_path)?;
    Ok(())
  }

  /// Run an arbitrary git command, panicking on failure
  pub fn git(&self, args: &[&str]) -> String {
    self
      .git_executor
      .execute_command(args, self.path_str())
      .unwrap_or_else(|e| panic!("git {} failed: {}", args.join(" "), e))
  }

  /// Write a file into the working tree without staging it
  pub fn write_file(&self, filename: &str, content: &str) {
    let file_path = self.path().join(filename);
    if let Some(parent) = file_path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&file_path, content).unwrap();
  }

  pub fn read_file(&self, filename: &str) -> String {
    fs::read_to_string(self.path().join(filename)).unwrap()
  }

  /// Creates a commit with a file
  pub fn create_commit(&self, message: &str, filename: &str, content: &str) -> String {
    self.create_commit_with_files(message, &[(filename, content)])
  }

  /// Creates a commit with multiple files
  pub fn create_commit_with_files(&self, message: &str, files: &[(&str, &str)]) -> String {
    for (filename, content) in files {
      self.write_file(filename, content);
      self.git(&["add", filename]);
    }
    self.git(&["commit", "-q", "-m", message]);
    self.head()
  }

  /// Creates a commit of one file with arbitrary (possibly non-UTF-8) content
  pub fn create_commit_with_bytes(&self, message: &str, filename: &str, content: &[u8]) -> String {
    fs::write(self.path().join(filename), content).unwrap();
    self.git(&["add", filename]);
    self.git(&["commit", "-q", "-m", message]);
    self.head()
  }

  pub fn read_file_bytes(&self, filename: &str) -> Vec<u8> {
    fs::read(self.path().join(filename)).unwrap()
  }

  /// Creates a commit with a fixed author/committer timestamp
  pub fn create_commit_with_timestamp(&self, message: &str, filename: &str, content: &str, timestamp: i64) -> String {
    self.write_file(filename, content);
    self.git(&["add", filename]);
    let date_str = format!("{timestamp} +0000");
    let env_vars = vec![("GIT_AUTHOR_DATE", date_str.as_str()), ("GIT_COMMITTER_DATE", date_str.as_str())];
    self
      .git_executor
      .execute_command_with_env(&["commit", "-q", "-m", message], self.path_str(), &env_vars)
      .unwrap_or_else(|e| panic!("Git commit failed: {}", e));
    self.head()
  }

  /// Get the current HEAD commit hash
  pub fn head(&self) -> String {
    self.git(&["rev-parse", "HEAD"])
  }

  /// Get the commit hash of a reference
  pub fn rev_parse(&self, ref_name: &str) -> Result<String, String> {
    self
      .git_executor
      .execute_command(&["rev-parse", "--verify", ref_name], self.path_str())
      .map_err(|e| e.to_string())
  }

  pub fn tree_of(&self, rev: &str) -> String {
    self.git(&["rev-parse", &format!("{rev}^{{tree}}")])
  }

  pub fn checkout(&self, ref_name: &str) -> Result<(), String> {
    self
      .git_executor
      .execute_command(&["checkout", "-q", ref_name], self.path_str())
      .map(|_| ())
      .map_err(|e| e.to_string())
  }

  pub fn reset_hard(&self, commit_hash: &str) -> Result<(), String> {
    self
      .git_executor
      .execute_command(&["reset", "-q", "--hard", commit_hash], self.path_str())
      .map(|_| ())
      .map_err(|e| e.to_string())
  }

  /// Subjects of the last N commits from HEAD, newest-first
  pub fn get_commit_messages(&self, count: usize) -> Vec<String> {
    let count_arg = format!("-{count}");
    self
      .git_executor
      .execute_command_lines(&["log", &count_arg, "--pretty=format:%s"], self.path_str())
      .unwrap_or_default()
  }

  /// Subjects of every commit reachable from HEAD, newest-first
  pub fn all_subjects(&self) -> Vec<String> {
    self
      .git_executor
      .execute_command_lines(&["log", "--pretty=format:%s"], self.path_str())
      .unwrap_or_default()
  }

  pub fn full_message(&self, rev: &str) -> String {
    self.git(&["log", "-1", "--format=%B", rev])
  }

  /// Files touched by a single commit
  pub fn files_in_commit(&self, rev: &str) -> Vec<String> {
    self
      .git_executor
      .execute_command_lines(&["diff-tree", "--no-commit-id", "--root", "-r", "--name-only", rev], self.path_str())
      .unwrap_or_default()
  }

  pub fn commit_count(&self) -> usize {
    self.git(&["rev-list", "--count", "HEAD"]).parse().unwrap()
  }

  /// True while git has rebase state on disk
  pub fn rebase_in_progress(&self) -> bool {
    let git_dir = self.git(&["rev-parse", "--git-dir"]);
    let git_dir = self.path().join(git_dir);
    git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists()
  }
}
