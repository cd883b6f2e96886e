//! Thin wrapper over the `git` binary used by every rebase-deck crate.

pub mod git_command_executor;
pub mod git_info;

#[cfg(test)]
mod git_command_executor_test;
