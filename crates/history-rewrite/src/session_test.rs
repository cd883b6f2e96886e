use crate::model::{RewriteError, RewriteOptions, RewriteRequest, SplitKind, short_sha};
use crate::plan::PlanAction;
use crate::request::move_to;
use crate::session::*;
use git_executor::git_command_executor::GitCommandExecutor;
use pretty_assertions::assert_eq;
use test_log::test;
use test_utils::git_test_utils::TestRepo;

fn open(repo: &TestRepo, base: Option<&str>) -> RewriteSession {
  RewriteSession::open(GitCommandExecutor::new(), repo.path_str(), base, RewriteOptions::default()).unwrap()
}

fn subjects(session: &RewriteSession) -> Vec<String> {
  session.history().unwrap().into_iter().map(|c| c.short_message).collect()
}

#[test]
fn opens_at_root_by_default() {
  let (repo, shas) = TestRepo::with_linear_history(3);
  let session = open(&repo, None);

  assert_eq!(session.anchor().sha, shas[0]);
  assert_eq!(session.start_head(), shas[2]);
  assert_eq!(subjects(&session), vec!["Commit 3", "Commit 2", "Commit 1"]);
}

#[test]
fn unknown_base_fails_to_open() {
  let (repo, _) = TestRepo::with_linear_history(1);
  let err = RewriteSession::open(GitCommandExecutor::new(), repo.path_str(), Some("nope"), RewriteOptions::default()).unwrap_err();
  assert!(matches!(err, RewriteError::RepositoryQuery(_)));
}

#[test]
fn rephrase_keeps_the_tree() {
  let (repo, shas) = TestRepo::with_linear_history(4);
  let tree_before = repo.tree_of("HEAD");
  let mut session = open(&repo, None);

  let outcome = session
    .apply(&RewriteRequest::Rephrase {
      sha: short_sha(&shas[1]).to_string(),
      message: "Second commit\n\nExplained".to_string(),
    })
    .unwrap();

  assert_eq!(outcome.action, PlanAction::Rebase);
  assert_eq!(outcome.anchor.sha, shas[0]);
  assert_eq!(repo.tree_of("HEAD"), tree_before);
  assert_eq!(subjects(&session), vec!["Commit 4", "Commit 3", "Second commit", "Commit 1"]);
  assert_eq!(repo.full_message("HEAD~2"), "Second commit\n\nExplained");
}

#[test]
fn drop_middle_commit_removes_its_file() {
  let (repo, shas) = TestRepo::with_linear_history(3);
  let mut session = open(&repo, None);

  session.apply(&RewriteRequest::Drop(shas[1].clone())).unwrap();

  assert_eq!(subjects(&session), vec!["Commit 3", "Commit 1"]);
  assert!(!repo.path().join("file2.txt").exists());
  assert_eq!(session.anchor().sha, shas[0]);
}

#[test]
fn dropping_the_tip_is_a_reset() {
  let (repo, shas) = TestRepo::with_linear_history(3);
  let mut session = open(&repo, None);

  let outcome = session.apply(&RewriteRequest::Drop(shas[2].clone())).unwrap();

  assert_eq!(outcome.action, PlanAction::ResetHard);
  assert_eq!(repo.head(), shas[1]);
  assert_eq!(outcome.anchor.sha, shas[0]);
}

#[test]
fn dropping_the_anchor_moves_it_up() {
  let (repo, shas) = TestRepo::with_linear_history(5);
  let mut session = open(&repo, Some(shas[2].as_str()));

  let outcome = session.apply(&RewriteRequest::Drop(shas[2].clone())).unwrap();

  assert_eq!(subjects(&session), vec!["Commit 5", "Commit 4"]);
  assert_eq!(repo.get_commit_messages(4), vec!["Commit 5", "Commit 4", "Commit 2", "Commit 1"]);
  assert_eq!(repo.git(&["log", "-1", "--format=%s", &outcome.anchor.sha]), "Commit 4");
}

#[test]
fn squash_collapses_into_one_commit() {
  let (repo, shas) = TestRepo::with_linear_history(4);
  let tree_before = repo.tree_of("HEAD");
  let mut session = open(&repo, None);

  session
    .apply(&RewriteRequest::Squash {
      shas: vec![shas[2].clone(), shas[1].clone()],
      message: "Two and three".to_string(),
    })
    .unwrap();

  assert_eq!(subjects(&session), vec!["Commit 4", "Two and three", "Commit 1"]);
  assert_eq!(repo.tree_of("HEAD"), tree_before);
  let mut files = repo.files_in_commit("HEAD~1");
  files.sort();
  assert_eq!(files, vec!["file2.txt", "file3.txt"]);
}

#[test]
fn non_adjacent_squash_is_rejected_without_touching_head() {
  let (repo, shas) = TestRepo::with_linear_history(3);
  let mut session = open(&repo, None);

  let err = session
    .apply(&RewriteRequest::Squash {
      shas: vec![shas[2].clone(), shas[0].clone()],
      message: "x".to_string(),
    })
    .unwrap_err();

  assert!(matches!(err, RewriteError::Validation(_)));
  assert_eq!(repo.head(), shas[2]);
}

#[test]
fn move_to_top_reorders() {
  let (repo, shas) = TestRepo::with_linear_history(3);
  let mut session = open(&repo, None);
  let request = move_to(&session.display_order().unwrap(), &shas[1], 0).unwrap();

  session.apply(&request).unwrap();

  assert_eq!(subjects(&session), vec!["Commit 2", "Commit 3", "Commit 1"]);
}

#[test]
fn unchanged_reorder_is_a_noop() {
  let (repo, shas) = TestRepo::with_linear_history(3);
  let mut session = open(&repo, None);
  let order = session.display_order().unwrap();

  let outcome = session.apply(&RewriteRequest::Reorder(order)).unwrap();

  assert_eq!(outcome.action, PlanAction::Noop);
  assert_eq!(repo.head(), shas[2]);
}

#[test]
fn split_file_adds_a_follow_up_commit() {
  let (repo, _) = TestRepo::with_linear_history(1);
  let target = repo.create_commit_with_files("Both files", &[("a.txt", "a\n"), ("b.txt", "b\n")]);
  repo.create_commit("Top", "top.txt", "top\n");
  let tree_before = repo.tree_of("HEAD");
  let mut session = open(&repo, None);

  session
    .apply(&RewriteRequest::Split {
      sha: target.clone(),
      kind: SplitKind::MoveFileOut("b.txt".to_string()),
    })
    .unwrap();

  assert_eq!(subjects(&session), vec!["Top", "b.txt changes moved out of below commit", "Both files", "Commit 1"]);
  assert_eq!(repo.files_in_commit("HEAD~2"), vec!["a.txt"]);
  assert_eq!(repo.files_in_commit("HEAD~1"), vec!["b.txt"]);
  assert_eq!(repo.tree_of("HEAD"), tree_before);
}

#[test]
fn split_hunks_preserves_content() {
  let repo = TestRepo::new();
  let original: String = (1..=30).map(|i| format!("line {i}\n")).collect();
  repo.create_commit("Base", "f.txt", &original);
  let changed = original.replace("line 2\n", "line 2 changed\n").replace("line 28\n", "line 28 changed\nextra\n");
  let target = repo.create_commit("Two hunks", "f.txt", &changed);
  repo.create_commit("After", "g.txt", "g\n");
  let tree_before = repo.tree_of("HEAD");
  let mut session = open(&repo, None);

  session
    .apply(&RewriteRequest::Split {
      sha: target.clone(),
      kind: SplitKind::Hunks,
    })
    .unwrap();

  let sha8 = short_sha(&target);
  assert_eq!(
    subjects(&session),
    vec!["After".to_string(), format!("change-2 of {sha8}"), format!("change-1 of {sha8}"), "Base".to_string()]
  );
  assert_eq!(repo.tree_of("HEAD"), tree_before);
  assert!(repo.git(&["show", "HEAD~2:f.txt"]).contains("line 2 changed"));
  assert!(!repo.git(&["show", "HEAD~2:f.txt"]).contains("line 28 changed"));
}

fn split_two_hunk_commit(repo: &TestRepo, original: &[u8], changed: &[u8]) -> String {
  repo.create_commit_with_bytes("Base", "f.txt", original);
  let target = repo.create_commit_with_bytes("Two hunks", "f.txt", changed);
  let mut session = open(repo, None);

  session
    .apply(&RewriteRequest::Split {
      sha: target.clone(),
      kind: SplitKind::Hunks,
    })
    .unwrap();
  target
}

#[test]
fn split_hunks_of_latin1_file() {
  let repo = TestRepo::new();
  let original: Vec<u8> = (1..=30).flat_map(|i| [b"ligne \xe9 ".as_slice(), i.to_string().as_bytes(), b"\n".as_slice()].concat()).collect();
  let changed: Vec<u8> = (1..=30)
    .flat_map(|i| match i {
      2 | 28 => [b"ligne chang\xe9e ".as_slice(), i.to_string().as_bytes(), b"\n".as_slice()].concat(),
      _ => [b"ligne \xe9 ".as_slice(), i.to_string().as_bytes(), b"\n".as_slice()].concat(),
    })
    .collect();

  let target = split_two_hunk_commit(&repo, &original, &changed);

  let sha8 = short_sha(&target);
  assert_eq!(repo.get_commit_messages(3), vec![format!("change-2 of {sha8}"), format!("change-1 of {sha8}"), "Base".to_string()]);
  assert_eq!(repo.read_file_bytes("f.txt"), changed);
  assert!(!repo.rebase_in_progress());
}

#[test]
fn split_hunks_ignores_diff_prefix_config() {
  let repo = TestRepo::new();
  repo.git(&["config", "diff.noprefix", "true"]);
  let original: String = (1..=30).map(|i| format!("line {i}\n")).collect();
  let changed = original.replace("line 2\n", "line 2 changed\n").replace("line 28\n", "line 28 changed\n");

  split_two_hunk_commit(&repo, original.as_bytes(), changed.as_bytes());

  assert_eq!(repo.commit_count(), 3);
  assert_eq!(repo.read_file("f.txt"), changed);
  assert!(repo.git(&["show", "HEAD~1:f.txt"]).contains("line 2 changed"));
  assert!(!repo.git(&["show", "HEAD~1:f.txt"]).contains("line 28 changed"));
}

#[test]
fn dirty_tree_blocks_rewrites() {
  let (repo, shas) = TestRepo::with_linear_history(2);
  let mut session = open(&repo, None);
  repo.write_file("file1.txt", "local edit");

  let err = session.apply(&RewriteRequest::Drop(shas[1].clone())).unwrap_err();

  assert!(err.to_string().contains("uncommitted changes"));
  assert_eq!(repo.head(), shas[1]);
  assert_eq!(repo.read_file("file1.txt"), "local edit");
}

#[test]
fn conflict_keeps_anchor_and_head() {
  let repo = TestRepo::new();
  let base = repo.create_commit("Base", "f.txt", "a\n");
  let second = repo.create_commit("Second", "f.txt", "b\n");
  let third = repo.create_commit("Third", "f.txt", "c\n");
  let mut session = open(&repo, None);

  let err = session.apply(&RewriteRequest::Reorder(vec![second, third.clone(), base.clone()])).unwrap_err();

  assert!(matches!(err, RewriteError::RewriteConflict { .. }));
  assert_eq!(repo.head(), third);
  assert_eq!(session.anchor().sha, base);
  assert!(!repo.rebase_in_progress());
}

#[test]
fn failsafe_restores_start() {
  let (repo, shas) = TestRepo::with_linear_history(3);
  let mut session = open(&repo, Some(shas[1].as_str()));

  session.apply(&RewriteRequest::Drop(shas[1].clone())).unwrap();
  assert_ne!(session.anchor().sha, shas[1]);

  session.failsafe_reset().unwrap();

  assert_eq!(repo.head(), shas[2]);
  assert_eq!(session.anchor().sha, shas[1]);
  assert_eq!(subjects(&session), vec!["Commit 3", "Commit 2"]);
}

#[test]
fn best_commit_round_trip() {
  let (repo, shas) = TestRepo::with_linear_history(3);
  let mut session = open(&repo, None);
  assert!(session.reset_to_best_commit().is_err());

  session
    .apply(&RewriteRequest::Rephrase {
      sha: shas[2].clone(),
      message: "Better".to_string(),
    })
    .unwrap();
  let best = session.mark_best_commit().unwrap();
  assert_eq!(session.best_commit(), Some(best.as_str()));

  session.apply(&RewriteRequest::Drop(best.clone())).unwrap();
  assert_eq!(repo.head(), shas[1]);

  session.reset_to_best_commit().unwrap();
  assert_eq!(repo.head(), best);
  assert_eq!(subjects(&session)[0], "Better");
}

#[test]
fn manual_reset_resolves_revisions() {
  let (repo, shas) = TestRepo::with_linear_history(3);
  let mut session = open(&repo, None);

  let sha = session.reset_hard("HEAD~1").unwrap();

  assert_eq!(sha, shas[1]);
  assert_eq!(repo.head(), shas[1]);
  assert_eq!(session.anchor().sha, shas[0]);
}
