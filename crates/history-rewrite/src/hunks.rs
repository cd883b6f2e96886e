//! Splits the patch of one file into per-hunk patches that can be applied one after another.

use anyhow::{Result, anyhow};
use regex::bytes::Regex;
use std::sync::OnceLock;
use tracing::{debug, instrument};

static HUNK_HEADER: OnceLock<Regex> = OnceLock::new();

fn hunk_header() -> &'static Regex {
  HUNK_HEADER.get_or_init(|| Regex::new(r"(?-u)^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@([^\r\n]*)").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkRange {
  pub old_start: u64,
  pub old_count: u64,
  pub new_start: u64,
  pub new_count: u64,
  /// Bytes after the closing `@@`, usually the enclosing function in the file's own encoding
  pub section: Vec<u8>,
}

impl HunkRange {
  pub fn parse(line: &[u8]) -> Option<Self> {
    let caps = hunk_header().captures(line)?;
    let number = |i: usize, default: u64| match caps.get(i) {
      Some(m) => std::str::from_utf8(m.as_bytes()).ok()?.parse::<u64>().ok(),
      None => Some(default),
    };
    Some(Self {
      old_start: number(1, 0)?,
      old_count: number(2, 1)?,
      new_start: number(3, 0)?,
      new_count: number(4, 1)?,
      section: caps.get(5).map_or_else(Vec::new, |m| m.as_bytes().to_vec()),
    })
  }

  fn render(&self, out: &mut Vec<u8>) {
    out.extend_from_slice(format!("@@ -{},{} +{},{} @@", self.old_start, self.old_count, self.new_start, self.new_count).as_bytes());
    out.extend_from_slice(&self.section);
    out.push(b'\n');
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
  pub range: HunkRange,
  /// Lines after the `@@` header, newline-terminated
  pub body: Vec<u8>,
}

/// A single-file patch: the `diff --git` header block plus its hunks in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
  pub header: Vec<u8>,
  pub hunks: Vec<Hunk>,
}

/// Parse a single-file patch as produced by `git diff-tree -p <sha> -- <path>`.
/// Works on raw bytes: content lines are kept exactly as git wrote them.
pub fn parse_file_patch(diff: &[u8]) -> Result<FilePatch> {
  let mut lines = diff.split_inclusive(|&b| b == b'\n').skip_while(|line| !line.starts_with(b"diff --git "));

  let mut header = Vec::new();
  let mut hunks: Vec<Hunk> = Vec::new();
  let mut seen_diff = false;

  for line in lines.by_ref() {
    if line.starts_with(b"diff --git ") {
      if seen_diff {
        return Err(anyhow!("patch touches more than one file"));
      }
      seen_diff = true;
    }

    if line.starts_with(b"@@") {
      let range = HunkRange::parse(line).ok_or_else(|| anyhow!("malformed hunk header: {}", String::from_utf8_lossy(line).trim_end()))?;
      hunks.push(Hunk { range, body: Vec::new() });
    } else if let Some(hunk) = hunks.last_mut() {
      hunk.body.extend_from_slice(line);
    } else {
      header.extend_from_slice(line);
    }
  }

  if !seen_diff {
    return Err(anyhow!("no diff found"));
  }

  for hunk in &mut hunks {
    if !hunk.body.ends_with(b"\n") {
      hunk.body.push(b'\n');
    }
  }

  Ok(FilePatch { header, hunks })
}

/// One standalone patch per hunk. Patch `n` expects the file as it is after patches `1..n`
/// were applied on top of the parent, so its old-side start line is shifted by the net
/// line delta of the hunks before it.
///
/// Hunks whose context overlaps a previous hunk's change are not detected.
#[instrument(skip(diff), fields(diff_len = diff.len()))]
pub fn split_into_hunk_patches(diff: &[u8]) -> Result<Vec<Vec<u8>>> {
  let patch = parse_file_patch(diff)?;

  let mut delta: i64 = 0;
  let mut patches = Vec::with_capacity(patch.hunks.len());
  for hunk in &patch.hunks {
    let shifted = i64::try_from(hunk.range.old_start)? + delta;
    let range = HunkRange {
      old_start: u64::try_from(shifted).map_err(|_| anyhow!("hunk starts before line 0 after shifting"))?,
      ..hunk.range.clone()
    };

    let mut out = Vec::with_capacity(patch.header.len() + hunk.body.len() + 64);
    out.extend_from_slice(&patch.header);
    range.render(&mut out);
    out.extend_from_slice(&hunk.body);
    patches.push(out);

    delta += i64::try_from(hunk.range.new_count)? - i64::try_from(hunk.range.old_count)?;
  }

  debug!(hunks = patches.len(), "partitioned patch");
  Ok(patches)
}

#[cfg(test)]
#[path = "hunks_test.rs"]
mod tests;
