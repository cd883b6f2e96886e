use crate::git_info::GitInfo;
use anyhow::{Result, anyhow};
use std::io::Read;
use std::process::{Child, Command, Output, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::instrument;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Result of a git invocation whose failure is an expected outcome rather than an error
/// (a rebase stopping on a conflict, or being killed after the deadline).
#[derive(Debug, Clone)]
pub struct CommandOutcome {
  pub exit_code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
  pub timed_out: bool,
}

impl CommandOutcome {
  pub fn success(&self) -> bool {
    !self.timed_out && self.exit_code == Some(0)
  }
}

#[derive(Clone, Debug)]
pub struct GitCommandExecutor {
  info: Arc<Mutex<Option<GitInfo>>>,
}

impl Default for GitCommandExecutor {
  fn default() -> Self {
    Self::new()
  }
}

impl GitCommandExecutor {
  #[must_use]
  pub fn new() -> Self {
    Self { info: Arc::new(Mutex::new(None)) }
  }

  /// Executor bound to an explicit git binary instead of the discovered one.
  pub fn with_git_path(git_path: &str) -> Result<Self> {
    let info = GitInfo::from_path(git_path).map_err(|e| anyhow!(e))?;
    Ok(Self {
      info: Arc::new(Mutex::new(Some(info))),
    })
  }

  #[instrument(skip(self))]
  pub fn get_info(&self) -> Result<GitInfo> {
    let mut guard = self.info.lock().map_err(|e| anyhow!("Failed to acquire lock: {}", e))?;
    if guard.is_none() {
      let info = GitInfo::discover().map_err(|e| anyhow!(e))?;
      tracing::info!(git_version = %info.version, git_path = %info.path, "discovered git info");
      *guard = Some(info);
    }

    guard.as_ref().ok_or_else(|| anyhow!("Git info should be initialized")).cloned()
  }

  fn validate_path(repository_path: &str) -> Result<()> {
    if repository_path.is_empty() {
      Err(anyhow!("repository path cannot be blank"))
    } else {
      Ok(())
    }
  }

  fn command(&self, args: &[&str], repository_path: &str, env_vars: &[(&str, &str)]) -> Result<Command> {
    Self::validate_path(repository_path)?;
    let git_info = self.get_info()?;

    let mut cmd = Command::new(&git_info.path);
    cmd.args(args).current_dir(repository_path).stdin(Stdio::null());
    for (key, value) in env_vars {
      cmd.env(key, value);
    }
    Ok(cmd)
  }

  fn output(&self, args: &[&str], repository_path: &str, env_vars: &[(&str, &str)]) -> Result<Output> {
    self
      .command(args, repository_path, env_vars)?
      .output()
      .map_err(|e| anyhow!("Failed to execute git command: {e}"))
  }

  fn handle_error<T>(&self, output: &Output, args: &[&str]) -> Result<T> {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    tracing::Span::current().record("success", false);
    tracing::error!(stderr = %stderr, "git command failed");
    let git_info = self.get_info()?;
    Err(anyhow!("git command failed: {} {}\nError: {stderr}", git_info.path, args.join(" ")))
  }

  /// Splits output into trimmed, non-empty lines
  pub fn parse_lines(output: &[u8]) -> Vec<String> {
    output
      .split(|&b| b == b'\n')
      .filter_map(|line| {
        let line_str = String::from_utf8_lossy(line);
        let trimmed = line_str.trim();
        if !trimmed.is_empty() { Some(trimmed.to_string()) } else { None }
      })
      .collect()
  }

  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command(&self, args: &[&str], repository_path: &str) -> Result<String> {
    let output = self.output(args, repository_path, &[])?;
    if output.status.success() {
      tracing::Span::current().record("success", true);
      Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
      self.handle_error(&output, args)
    }
  }

  /// Untrimmed stdout, for output whose exact bytes matter (patches, raw log records)
  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_raw(&self, args: &[&str], repository_path: &str) -> Result<String> {
    let output = self.output(args, repository_path, &[])?;
    if output.status.success() {
      tracing::Span::current().record("success", true);
      Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
      self.handle_error(&output, args)
    }
  }

  /// Stdout bytes as produced; patches of non-UTF-8 files must not pass through a `String`
  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_bytes(&self, args: &[&str], repository_path: &str) -> Result<Vec<u8>> {
    let output = self.output(args, repository_path, &[])?;
    if output.status.success() {
      tracing::Span::current().record("success", true);
      Ok(output.stdout)
    } else {
      self.handle_error(&output, args)
    }
  }

  /// Trimmed output plus exit code; a non-zero exit is not an error here and the
  /// returned text is stderr in that case.
  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_with_status(&self, args: &[&str], repository_path: &str) -> Result<(String, i32)> {
    let output = self.output(args, repository_path, &[])?;
    let exit_code = output.status.code().unwrap_or(-1);

    if output.status.success() {
      tracing::Span::current().record("success", true);
      Ok((String::from_utf8_lossy(&output.stdout).trim().to_string(), exit_code))
    } else {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      tracing::Span::current().record("success", false);
      tracing::debug!(stderr = %stderr, exit_code, "git command exited non-zero");
      Ok((stderr, exit_code))
    }
  }

  #[instrument(
    skip(self, env_vars),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_with_env(&self, args: &[&str], repository_path: &str, env_vars: &[(&str, &str)]) -> Result<String> {
    let output = self.output(args, repository_path, env_vars)?;
    if output.status.success() {
      tracing::Span::current().record("success", true);
      Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
      self.handle_error(&output, args)
    }
  }

  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_lines(&self, args: &[&str], repository_path: &str) -> Result<Vec<String>> {
    let output = self.output(args, repository_path, &[])?;
    if output.status.success() {
      tracing::Span::current().record("success", true);
      Ok(Self::parse_lines(&output.stdout))
    } else {
      self.handle_error(&output, args)
    }
  }

  /// Runs a long-lived git command (a rebase) with hook variables and an optional deadline.
  /// The child is killed when the deadline passes; the caller decides how to recover.
  /// Only spawn/wait failures are errors: a non-zero exit is reported in the outcome.
  #[instrument(
    skip(self, env_vars),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      timeout_ms = timeout.map(|t| t.as_millis() as u64),
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_with_timeout(&self, args: &[&str], repository_path: &str, env_vars: &[(&str, &str)], timeout: Option<Duration>) -> Result<CommandOutcome> {
    let mut child = self
      .command(args, repository_path, env_vars)?
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|e| anyhow!("Failed to spawn git command: {e}"))?;

    // pipes are drained on their own threads so a chatty child cannot block on a full pipe
    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let (exit_code, timed_out) = wait_with_deadline(&mut child, timeout)?;

    // grandchildren (exec steps, hooks) may still hold the pipes after a kill; leave the readers detached
    let (stdout, stderr) = if timed_out {
      (String::new(), String::new())
    } else {
      (stdout_reader.join().unwrap_or_default(), stderr_reader.join().unwrap_or_default())
    };

    let outcome = CommandOutcome {
      exit_code,
      stdout,
      stderr,
      timed_out,
    };
    tracing::Span::current().record("success", outcome.success());
    if timed_out {
      tracing::warn!("git command killed after deadline");
    } else if !outcome.success() {
      tracing::debug!(exit_code = ?outcome.exit_code, stderr = %outcome.stderr.trim(), "git command exited non-zero");
    }
    Ok(outcome)
  }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
  thread::spawn(move || {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
      let _ = pipe.read_to_end(&mut buffer);
    }
    String::from_utf8_lossy(&buffer).to_string()
  })
}

fn wait_with_deadline(child: &mut Child, timeout: Option<Duration>) -> Result<(Option<i32>, bool)> {
  let Some(timeout) = timeout else {
    let status = child.wait().map_err(|e| anyhow!("Failed to wait for git command: {e}"))?;
    return Ok((status.code(), false));
  };

  let deadline = Instant::now() + timeout;
  loop {
    match child.try_wait() {
      Ok(Some(status)) => return Ok((status.code(), false)),
      Ok(None) => {}
      Err(e) => return Err(anyhow!("Failed to poll git command: {e}")),
    }

    if Instant::now() >= deadline {
      let _ = child.kill();
      let status = child.wait().map_err(|e| anyhow!("Failed to reap killed git command: {e}"))?;
      return Ok((status.code(), true));
    }
    thread::sleep(POLL_INTERVAL);
  }
}
