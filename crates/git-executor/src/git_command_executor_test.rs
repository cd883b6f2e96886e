use crate::git_command_executor::GitCommandExecutor;
use pretty_assertions::assert_eq;
use std::time::Duration;
use test_log::test;

fn init_repo() -> (tempfile::TempDir, GitCommandExecutor) {
  let dir = tempfile::tempdir().unwrap();
  let git = GitCommandExecutor::new();
  let path = dir.path().to_str().unwrap();
  git.execute_command(&["init", "-q"], path).unwrap();
  git.execute_command(&["config", "user.name", "Test User"], path).unwrap();
  git.execute_command(&["config", "user.email", "test@example.com"], path).unwrap();
  (dir, git)
}

#[test]
fn blank_repository_path_is_rejected() {
  let git = GitCommandExecutor::new();
  let err = git.execute_command(&["status"], "").unwrap_err();
  assert!(err.to_string().contains("repository path cannot be blank"));
}

#[test]
fn failing_command_reports_stderr() {
  let (dir, git) = init_repo();
  let err = git.execute_command(&["rev-parse", "--verify", "no-such-ref"], dir.path().to_str().unwrap()).unwrap_err();
  assert!(err.to_string().contains("rev-parse --verify no-such-ref"));
}

#[test]
fn status_variant_returns_exit_code_instead_of_error() {
  let (dir, git) = init_repo();
  let (_, code) = git
    .execute_command_with_status(&["rev-parse", "--verify", "-q", "HEAD"], dir.path().to_str().unwrap())
    .unwrap();
  assert_ne!(code, 0);
}

#[test]
fn lines_are_trimmed_and_empty_lines_dropped() {
  assert_eq!(GitCommandExecutor::parse_lines(b"  a  \n\n b\n"), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn env_variables_reach_git() {
  let (dir, git) = init_repo();
  let path = dir.path().to_str().unwrap();
  git
    .execute_command_with_env(
      &["commit", "--allow-empty", "-q", "-m", "dated"],
      path,
      &[("GIT_AUTHOR_DATE", "1700000000 +0000"), ("GIT_COMMITTER_DATE", "1700000000 +0000")],
    )
    .unwrap();
  assert_eq!(git.execute_command(&["log", "-1", "--format=%at"], path).unwrap(), "1700000000");
}

#[test]
fn command_without_deadline_completes() {
  let (dir, git) = init_repo();
  let outcome = git
    .execute_command_with_timeout(&["status", "--porcelain"], dir.path().to_str().unwrap(), &[], None)
    .unwrap();
  assert!(outcome.success());
  assert!(!outcome.timed_out);
}

#[cfg(unix)]
#[test]
fn command_is_killed_after_deadline() {
  let (dir, git) = init_repo();
  let outcome = git
    .execute_command_with_timeout(
      &["commit", "--allow-empty"],
      dir.path().to_str().unwrap(),
      &[("GIT_EDITOR", "sleep 2")],
      Some(Duration::from_millis(200)),
    )
    .unwrap();
  assert!(outcome.timed_out);
  assert!(!outcome.success());
}

#[test]
fn explicit_git_path_is_validated() {
  let git = GitCommandExecutor::with_git_path("git").unwrap();
  assert_eq!(git.get_info().unwrap().path, "git");
  assert!(git.get_info().unwrap().validate_minimum_version().is_ok());

  assert!(GitCommandExecutor::with_git_path("/nonexistent/bin/git").is_err());
}

#[test]
fn bytes_variant_keeps_non_utf8_output() {
  let (dir, git) = init_repo();
  let path = dir.path().to_str().unwrap();
  std::fs::write(dir.path().join("latin1.txt"), b"caf\xe9\n").unwrap();
  git.execute_command(&["add", "latin1.txt"], path).unwrap();
  let blob = git.execute_command(&["hash-object", "latin1.txt"], path).unwrap();

  assert_eq!(git.execute_command_bytes(&["cat-file", "blob", &blob], path).unwrap(), b"caf\xe9\n".to_vec());
  assert!(git.execute_command_raw(&["cat-file", "blob", &blob], path).unwrap().contains('\u{FFFD}'));
}
