//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated workspace.
///
/// Each test gets its own temporary directory holding `capsa.json` and the
/// component directories it references.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create a workspace from manifest JSON.
  ///
  /// A directory is created for every component so that loading succeeds.
  pub fn with_manifest(manifest: &str) -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("capsa.json"), manifest).unwrap();

    let parsed: serde_json::Value = serde_json::from_str(manifest).unwrap();
    for component in parsed["components"].as_array().into_iter().flatten() {
      let dir = component["path"].as_str().or_else(|| component["id"].as_str()).unwrap();
      std::fs::create_dir_all(temp.path().join(dir)).unwrap();
    }

    Self { temp }
  }

  /// Write a file relative to the workspace root.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Write an executable script relative to the workspace root.
  #[cfg(unix)]
  pub fn write_script(&self, relative_path: &str, content: &str) {
    use std::os::unix::fs::PermissionsExt;

    let path = self.write_file(relative_path, content);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }

  pub fn root(&self) -> PathBuf {
    self.temp.path().to_path_buf()
  }

  /// Get a Command for the capsa binary pointed at this workspace.
  ///
  /// The workspace is passed through `CAPSA_WORKSPACE` and parallelism is
  /// left at its default.
  pub fn capsa_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("capsa");
    cmd.env("CAPSA_WORKSPACE", self.root());
    cmd.env_remove("CAPSA_PARALLELISM");
    cmd
  }
}
