use crate::args::*;
use clap::Parser;
use pretty_assertions::assert_eq;
use std::time::Duration;

fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
  Cli::try_parse_from(std::iter::once("rebase-deck").chain(args.iter().copied()))
}

#[test]
fn global_options_and_defaults() {
  let cli = parse(&["-C", "/tmp/repo", "--base", "abc", "log", "--json"]).unwrap();

  assert_eq!(cli.repo.to_str(), Some("/tmp/repo"));
  assert_eq!(cli.base.as_deref(), Some("abc"));
  assert_eq!(cli.rebase_timeout(), Some(Duration::from_secs(600)));
  assert!(matches!(cli.command, Command::Log { json: true }));
}

#[test]
fn zero_timeout_disables_deadline() {
  let cli = parse(&["--timeout-secs", "0", "drop", "abc"]).unwrap();
  assert_eq!(cli.rebase_timeout(), None);
}

#[test]
fn squash_needs_two_commits_and_one_message_source() {
  let cli = parse(&["squash", "a", "b", "-m", "joined"]).unwrap();
  let Command::Squash { shas, message } = cli.command else {
    panic!("expected squash");
  };
  assert_eq!(shas, vec!["a", "b"]);
  assert_eq!(message.read().unwrap(), "joined");

  assert!(parse(&["squash", "a", "-m", "x"]).is_err());
  assert!(parse(&["squash", "a", "b"]).is_err());
  assert!(parse(&["squash", "a", "b", "-m", "x", "-F", "msg.txt"]).is_err());
}

#[test]
fn squash_with_requires_exactly_one_side() {
  let cli = parse(&["squash-with", "abc", "--below", "-m", "m"]).unwrap();
  let Command::SquashWith { side, .. } = cli.command else {
    panic!("expected squash-with");
  };
  assert!(side.below && !side.above);

  assert!(parse(&["squash-with", "abc", "-m", "m"]).is_err());
  assert!(parse(&["squash-with", "abc", "--above", "--below", "-m", "m"]).is_err());
}

#[test]
fn message_file_is_read() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("message.txt");
  std::fs::write(&path, "From file\n\nBody\n").unwrap();

  let cli = parse(&["rephrase", "abc", "-F", path.to_str().unwrap()]).unwrap();
  let Command::Rephrase { message, .. } = cli.command else {
    panic!("expected rephrase");
  };
  assert_eq!(message.read().unwrap(), "From file\n\nBody\n");
}

#[test]
fn split_and_move_arguments() {
  assert!(matches!(
    parse(&["split-file", "abc", "src/lib.rs"]).unwrap().command,
    Command::SplitFile { ref sha, ref path } if sha == "abc" && path == "src/lib.rs"
  ));
  assert!(matches!(parse(&["move", "abc", "2"]).unwrap().command, Command::Move { position: 2, .. }));
  assert!(parse(&["move", "abc", "top"]).is_err());
}

#[test]
fn show_can_narrow_to_one_file() {
  assert!(matches!(
    parse(&["show", "abc", "--path", "src/lib.rs"]).unwrap().command,
    Command::Show { ref sha, path: Some(ref path) } if sha == "abc" && path == "src/lib.rs"
  ));
  assert!(matches!(parse(&["show", "abc"]).unwrap().command, Command::Show { path: None, .. }));
}
