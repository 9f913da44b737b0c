//! Test doubles for capsa-lib.
//!
//! - [`ScriptedCapsule`]: capsule whose commands follow preset scripts instead of spawning processes
//! - [`MemoryWorkspace`]: workspace over an in-memory component list
//! - [`RecordingSink`]: sink that keeps every notice and output chunk

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::capsule::{Capsule, CapsuleError, ExecHandle, ProcessExit};
use crate::component::{Component, ComponentConfig, ComponentId, ResolvedComponent};
use crate::sink::{Notice, OutputSink};
use crate::task::TaskContext;
use crate::workspace::{ComponentStatus, Workspace, WorkspaceError};

/// Shared, ordered log of capsule events (`"start <label> <cmd>"`, `"end ..."`, `"kill ..."`).
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
  pub fn push(&self, event: String) {
    self.0.lock().unwrap().push(event);
  }

  pub fn events(&self) -> Vec<String> {
    self.0.lock().unwrap().clone()
  }

  pub fn position(&self, event: &str) -> Option<usize> {
    self.events().iter().position(|e| e == event)
  }

  pub fn contains(&self, event: &str) -> bool {
    self.position(event).is_some()
  }
}

/// Tracks how many commands are in flight and the maximum observed.
#[derive(Debug, Clone, Default)]
pub struct Gauge {
  current: Arc<AtomicUsize>,
  max: Arc<AtomicUsize>,
}

impl Gauge {
  pub fn enter(&self) {
    let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
    self.max.fetch_max(now, Ordering::SeqCst);
  }

  pub fn exit(&self) {
    self.current.fetch_sub(1, Ordering::SeqCst);
  }

  pub fn max(&self) -> usize {
    self.max.load(Ordering::SeqCst)
  }
}

/// Behaviour of one scripted command.
#[derive(Debug, Clone, Default)]
pub struct Script {
  pub output: Vec<String>,
  pub exit_code: i32,
  pub delay: Duration,
  /// Run until terminated.
  pub hang: bool,
}

impl Script {
  pub fn ok() -> Self {
    Self::default()
  }

  pub fn exit(code: i32) -> Self {
    Self {
      exit_code: code,
      ..Self::default()
    }
  }

  pub fn hang() -> Self {
    Self {
      hang: true,
      ..Self::default()
    }
  }

  pub fn with_output(mut self, line: &str) -> Self {
    self.output.push(line.to_string());
    self
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }
}

/// Capsule that plays back scripts keyed by full command line.
///
/// Unknown command lines succeed immediately without output.
#[derive(Debug, Clone)]
pub struct ScriptedCapsule {
  label: String,
  root: PathBuf,
  scripts: HashMap<String, Script>,
  spawn_failures: HashSet<String>,
  log: EventLog,
  gauge: Gauge,
}

impl Default for ScriptedCapsule {
  fn default() -> Self {
    Self::new()
  }
}

impl ScriptedCapsule {
  pub fn new() -> Self {
    Self {
      label: String::new(),
      root: std::env::temp_dir(),
      scripts: HashMap::new(),
      spawn_failures: HashSet::new(),
      log: EventLog::default(),
      gauge: Gauge::default(),
    }
  }

  pub fn labeled(mut self, label: &str) -> Self {
    self.label = label.to_string();
    self
  }

  pub fn with_root(mut self, root: &Path) -> Self {
    self.root = root.to_path_buf();
    self
  }

  pub fn with_log(mut self, log: EventLog) -> Self {
    self.log = log;
    self
  }

  pub fn with_gauge(mut self, gauge: Gauge) -> Self {
    self.gauge = gauge;
    self
  }

  pub fn script(mut self, command_line: &str, script: Script) -> Self {
    self.scripts.insert(command_line.to_string(), script);
    self
  }

  pub fn fail_spawn(mut self, command_line: &str) -> Self {
    self.spawn_failures.insert(command_line.to_string());
    self
  }

  pub fn log(&self) -> &EventLog {
    &self.log
  }
}

#[async_trait]
impl Capsule for ScriptedCapsule {
  fn root(&self) -> &Path {
    &self.root
  }

  async fn exec(&self, command: &str, args: &[String]) -> Result<ExecHandle, CapsuleError> {
    let mut line = command.to_string();
    for arg in args {
      line.push(' ');
      line.push_str(arg);
    }

    if self.spawn_failures.contains(&line) {
      return Err(CapsuleError::Spawn {
        command: command.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted spawn failure"),
      });
    }

    let script = self.scripts.get(&line).cloned().unwrap_or_default();
    let (out_tx, out_rx) = mpsc::channel(16);
    let (exit_tx, exit_rx) = oneshot::channel();
    let (term_tx, mut term_rx) = oneshot::channel::<()>();

    let log = self.log.clone();
    let gauge = self.gauge.clone();
    let tag = format!("{} {}", self.label, line);
    log.push(format!("start {}", tag));
    gauge.enter();

    tokio::spawn(async move {
      let mut killed = false;
      tokio::select! {
        _ = tokio::time::sleep(script.delay) => {}
        Ok(()) = &mut term_rx => killed = true,
      }

      if !killed {
        for chunk in &script.output {
          let _ = out_tx.send(Bytes::from(format!("{}\n", chunk))).await;
        }
        if script.hang && (&mut term_rx).await.is_ok() {
          killed = true;
        }
      }
      drop(out_tx);

      gauge.exit();
      let exit = if killed {
        log.push(format!("kill {}", tag));
        ProcessExit::signalled()
      } else {
        log.push(format!("end {}", tag));
        ProcessExit::from_code(script.exit_code)
      };
      let _ = exit_tx.send(Ok(exit));
    });

    Ok(ExecHandle::new(out_rx, exit_rx, term_tx))
  }
}

/// Sink that records everything it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
  notices: Mutex<Vec<Notice>>,
  output: Mutex<HashMap<ComponentId, Vec<u8>>>,
}

impl RecordingSink {
  pub fn notices(&self) -> Vec<Notice> {
    self.notices.lock().unwrap().clone()
  }

  pub fn output_of(&self, component: &ComponentId) -> String {
    self
      .output
      .lock()
      .unwrap()
      .get(component)
      .map(|bytes| String::from_utf8_lossy(bytes).to_string())
      .unwrap_or_default()
  }
}

impl OutputSink for RecordingSink {
  fn output(&self, component: &ComponentId, chunk: &[u8]) {
    self
      .output
      .lock()
      .unwrap()
      .entry(component.clone())
      .or_default()
      .extend_from_slice(chunk);
  }

  fn notice(&self, notice: &Notice) {
    self.notices.lock().unwrap().push(notice.clone());
  }
}

/// Workspace over an in-memory list of components.
#[derive(Default)]
pub struct MemoryWorkspace {
  components: Vec<(Component, ComponentStatus)>,
  capsules: HashMap<ComponentId, Arc<dyn Capsule>>,
  load_calls: AtomicUsize,
  fail_load: bool,
}

impl MemoryWorkspace {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_component(
    mut self,
    id: &str,
    status: ComponentStatus,
    config: ComponentConfig,
    capsule: Arc<dyn Capsule>,
  ) -> Self {
    let id = ComponentId::from(id);
    self.capsules.insert(id.clone(), capsule);
    self.components.push((Component::new(id, config), status));
    self
  }

  pub fn failing_load(mut self) -> Self {
    self.fail_load = true;
    self
  }

  pub fn load_calls(&self) -> usize {
    self.load_calls.load(Ordering::SeqCst)
  }

  fn find(&self, id: &ComponentId) -> Result<&Component, WorkspaceError> {
    self
      .components
      .iter()
      .map(|(component, _)| component)
      .find(|component| &component.id == id)
      .ok_or_else(|| WorkspaceError::ComponentNotFound(id.clone()))
  }

  fn with_status(&self, status: ComponentStatus) -> Vec<Component> {
    self
      .components
      .iter()
      .filter(|(_, s)| *s == status)
      .map(|(component, _)| component.clone())
      .collect()
  }
}

#[async_trait]
impl Workspace for MemoryWorkspace {
  async fn modified(&self) -> Result<Vec<Component>, WorkspaceError> {
    Ok(self.with_status(ComponentStatus::Modified))
  }

  async fn new_components(&self) -> Result<Vec<Component>, WorkspaceError> {
    Ok(self.with_status(ComponentStatus::New))
  }

  async fn get_many(&self, ids: &[ComponentId]) -> Result<Vec<Component>, WorkspaceError> {
    ids.iter().map(|id| self.find(id).cloned()).collect()
  }

  async fn load(&self, ids: &[ComponentId]) -> Result<Vec<ResolvedComponent>, WorkspaceError> {
    self.load_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_load {
      return Err(WorkspaceError::Capsule {
        component: ids.first().cloned().unwrap_or_else(|| ComponentId::from("?")),
        message: "scripted load failure".to_string(),
      });
    }
    ids
      .iter()
      .map(|id| {
        let component = self.find(id)?.clone();
        let capsule = self.capsules[id].clone();
        Ok(ResolvedComponent::new(component, capsule))
      })
      .collect()
  }
}

pub fn resolved(id: &str, config: ComponentConfig, capsule: Arc<dyn Capsule>) -> ResolvedComponent {
  ResolvedComponent::new(Component::new(id, config), capsule)
}

/// Task context for a component with no pipelines and a scripted capsule.
pub fn task_context(id: &str) -> TaskContext {
  let component = Arc::new(resolved(id, ComponentConfig::default(), Arc::new(ScriptedCapsule::new())));
  TaskContext::new(component, "build", 0, Arc::new(RecordingSink::default()))
}
