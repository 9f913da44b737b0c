//! Shared helpers for pipeline integration tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use capsa_lib::sink::{Notice, OutputSink};
use capsa_lib::workspace::ManifestWorkspace;
use capsa_lib::{ComponentId, Orchestrator, TaskRegistry};
use tempfile::TempDir;

/// Sink that keeps everything for later assertions.
#[derive(Default)]
pub struct CollectingSink {
  notices: Mutex<Vec<Notice>>,
  output: Mutex<HashMap<ComponentId, String>>,
}

impl CollectingSink {
  pub fn notices(&self) -> Vec<Notice> {
    self.notices.lock().unwrap().clone()
  }

  pub fn output_of(&self, id: &str) -> String {
    self
      .output
      .lock()
      .unwrap()
      .get(&ComponentId::from(id))
      .cloned()
      .unwrap_or_default()
  }
}

impl OutputSink for CollectingSink {
  fn output(&self, component: &ComponentId, chunk: &[u8]) {
    self
      .output
      .lock()
      .unwrap()
      .entry(component.clone())
      .or_default()
      .push_str(&String::from_utf8_lossy(chunk));
  }

  fn notice(&self, notice: &Notice) {
    self.notices.lock().unwrap().push(notice.clone());
  }
}

/// Workspace in a temporary directory.
pub struct TestWorkspace {
  pub temp: TempDir,
}

impl TestWorkspace {
  /// Write `capsa.json` and create a directory per component id.
  pub fn new(manifest: &str, components: &[&str]) -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("capsa.json"), manifest).unwrap();
    for id in components {
      std::fs::create_dir_all(temp.path().join(id)).unwrap();
    }
    Self { temp }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// Write an executable shell script.
  #[cfg(unix)]
  pub fn script(&self, relative_path: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    let path = self.root().join(relative_path);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }

  pub fn orchestrator(&self, registry: TaskRegistry, sink: &Arc<CollectingSink>) -> Orchestrator {
    let workspace = ManifestWorkspace::open(self.root()).unwrap();
    Orchestrator::new(Arc::new(workspace), registry).with_sink(sink.clone())
  }
}
