//! Terminal rendering of pipeline output and notices.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use owo_colors::{OwoColorize, Stream};

use capsa_lib::ComponentId;
use capsa_lib::sink::{Notice, OutputSink};

use crate::output::symbols;

/// Sink that prints every output line prefixed with its component id.
///
/// Output of concurrently running components arrives interleaved. Partial
/// lines are held back per component so that printed lines never mix.
pub struct TerminalSink {
  to_stderr: bool,
  pending: Mutex<HashMap<ComponentId, Vec<u8>>>,
}

impl TerminalSink {
  pub fn stdout() -> Self {
    Self {
      to_stderr: false,
      pending: Mutex::new(HashMap::new()),
    }
  }

  /// Keeps stdout free for machine-readable output.
  pub fn stderr() -> Self {
    Self {
      to_stderr: true,
      ..Self::stdout()
    }
  }

  fn stream(&self) -> Stream {
    if self.to_stderr { Stream::Stderr } else { Stream::Stdout }
  }

  fn write(&self, text: &str) {
    // A closed terminal must not fail the run.
    let _ = if self.to_stderr {
      std::io::stderr().lock().write_all(text.as_bytes())
    } else {
      std::io::stdout().lock().write_all(text.as_bytes())
    };
  }

  fn prefixed(&self, component: &ComponentId, line: &str) -> String {
    let tag = format!("[{}]", component);
    format!("{} {}\n", tag.if_supports_color(self.stream(), |s| s.cyan()), line)
  }

  /// Print whatever is left of a component's last line.
  fn flush(&self, component: &ComponentId) {
    let rest = match self.pending.lock() {
      Ok(mut pending) => pending.remove(component),
      Err(_) => None,
    };
    if let Some(rest) = rest.filter(|rest| !rest.is_empty()) {
      self.write(&self.prefixed(component, &String::from_utf8_lossy(&rest)));
    }
  }
}

impl OutputSink for TerminalSink {
  fn output(&self, component: &ComponentId, chunk: &[u8]) {
    let lines = match self.pending.lock() {
      Ok(mut pending) => take_lines(pending.entry(component.clone()).or_default(), chunk),
      Err(_) => return,
    };
    if lines.is_empty() {
      return;
    }
    let text: String = lines.iter().map(|line| self.prefixed(component, line)).collect();
    self.write(&text);
  }

  fn notice(&self, notice: &Notice) {
    let stream = self.stream();
    let message = notice.to_string();
    let line = match notice {
      Notice::Started { .. } => format!("{} {}", symbols::ARROW.if_supports_color(stream, |s| s.cyan()), message),
      Notice::Step { .. } => format!("  {}", message.if_supports_color(stream, |s| s.dimmed())),
      Notice::Skipped { .. } => format!(
        "{} {}",
        symbols::SKIP.if_supports_color(stream, |s| s.dimmed()),
        message.if_supports_color(stream, |s| s.dimmed())
      ),
      Notice::Succeeded { component, .. } => {
        self.flush(component);
        format!("{} {}", symbols::SUCCESS.if_supports_color(stream, |s| s.green()), message)
      }
      Notice::Failed { component, .. } => {
        self.flush(component);
        format!(
          "{} {}",
          symbols::ERROR.if_supports_color(stream, |s| s.red()),
          message.if_supports_color(stream, |s| s.red())
        )
      }
      Notice::Cancelled { component } => {
        self.flush(component);
        format!(
          "{} {}",
          symbols::WARNING.if_supports_color(stream, |s| s.yellow()),
          message.if_supports_color(stream, |s| s.yellow())
        )
      }
    };
    self.write(&format!("{}\n", line));
  }
}

/// Append `chunk` to `pending` and remove every complete line from it.
fn take_lines(pending: &mut Vec<u8>, chunk: &[u8]) -> Vec<String> {
  pending.extend_from_slice(chunk);
  let mut lines = Vec::new();
  while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
    let line: Vec<u8> = pending.drain(..=pos).collect();
    let text = String::from_utf8_lossy(&line[..pos]);
    lines.push(text.trim_end_matches('\r').to_string());
  }
  lines
}
