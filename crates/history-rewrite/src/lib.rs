//! Rewrites linear git history (reorder, drop, squash, rephrase, split) by planning the
//! smallest `git rebase -i` that reaches the requested arrangement and driving it
//! non-interactively.

pub mod driver;
pub mod emit;
pub mod history;
pub mod hunks;
pub mod model;
pub mod plan;
pub mod repo_info;
pub mod request;
pub mod session;

pub use model::{BaseAnchor, CommitRecord, RewriteError, RewriteOptions, RewriteRequest, RewriteResult, SplitKind, Upstream};
pub use session::{RewriteOutcome, RewriteSession};
