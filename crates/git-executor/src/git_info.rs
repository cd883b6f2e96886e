use std::process::Command;

/// Oldest git accepted: the merge backend became the default for `rebase -i` in 2.26,
/// and abort/exec behavior is relied upon from there.
const MIN_MAJOR: u32 = 2;
const MIN_MINOR: u32 = 26;

#[derive(Debug, Clone)]
pub struct GitInfo {
  pub version: String,
  pub path: String,
}

impl GitInfo {
  // locates the git executable and reads its version
  pub fn discover() -> Result<Self, String> {
    let git_path = get_git_path()?;
    Self::from_path(&git_path)
  }

  pub fn from_path(git_path: &str) -> Result<Self, String> {
    let git_version = execute_command(Command::new(git_path).arg("version"), "Failed to get git version")?;
    Ok(Self {
      version: git_version.strip_prefix("git version ").unwrap_or(&git_version).to_string(),
      path: git_path.to_string(),
    })
  }

  /// `(major, minor)` of the version string, e.g. `2.39.2 (Apple Git-143)` -> `(2, 39)`
  pub fn parse_version(&self) -> Result<(u32, u32), String> {
    parse_major_minor(&self.version)
  }

  pub fn validate_minimum_version(&self) -> Result<(), String> {
    let (major, minor) = self.parse_version()?;
    if (major, minor) < (MIN_MAJOR, MIN_MINOR) {
      Err(format!(
        "Git version {major}.{minor} is too old. rebase-deck requires Git {MIN_MAJOR}.{MIN_MINOR} or newer."
      ))
    } else {
      Ok(())
    }
  }
}

pub(crate) fn parse_major_minor(version: &str) -> Result<(u32, u32), String> {
  let mut parts = version.split(|c: char| c == '.' || c.is_whitespace());
  let major = parts
    .next()
    .and_then(|p| p.parse::<u32>().ok())
    .ok_or_else(|| format!("Invalid version format: {version}"))?;
  let minor = parts
    .next()
    .and_then(|p| p.parse::<u32>().ok())
    .ok_or_else(|| format!("Invalid version format: {version}"))?;
  Ok((major, minor))
}

/// Execute a command and return its trimmed output as a string
pub(crate) fn execute_command(command: &mut Command, error_msg: &str) -> Result<String, String> {
  let output = command.output().map_err(|e| format!("{error_msg}: {e}"))?;
  if !output.status.success() {
    return Err(format!("{}: {}", error_msg, String::from_utf8_lossy(&output.stderr)));
  }

  Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

// GUI-launched processes on macOS do not inherit the login PATH
#[cfg(target_os = "macos")]
fn get_git_path() -> Result<String, String> {
  execute_command(Command::new("/bin/zsh").args(["-l", "-c", "which git"]), "Could not find git executable")
}

#[cfg(not(target_os = "macos"))]
fn get_git_path() -> Result<String, String> {
  Ok(String::from("git"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn parses_plain_and_vendor_versions() {
    assert_eq!(parse_major_minor("2.43.0").unwrap(), (2, 43));
    assert_eq!(parse_major_minor("2.39.2 (Apple Git-143)").unwrap(), (2, 39));
    assert_eq!(parse_major_minor("2.41.0.windows.1").unwrap(), (2, 41));
    assert!(parse_major_minor("unknown").is_err());
  }

  #[test]
  fn rejects_versions_before_merge_backend() {
    let old = GitInfo {
      version: "2.25.1".to_string(),
      path: "git".to_string(),
    };
    assert!(old.validate_minimum_version().is_err());

    let current = GitInfo {
      version: "2.26.0".to_string(),
      path: "git".to_string(),
    };
    assert!(current.validate_minimum_version().is_ok());
  }
}
