//! Shared test utilities for the rebase-deck workspace

pub mod git_test_utils;
