//! Bounded capture of the most recent output bytes.

use std::collections::VecDeque;

/// Keeps the last `capacity` bytes written to it.
#[derive(Debug, Clone)]
pub struct TailBuffer {
  buf: VecDeque<u8>,
  capacity: usize,
  dropped: usize,
}

impl TailBuffer {
  pub fn new(capacity: usize) -> Self {
    Self {
      buf: VecDeque::with_capacity(capacity.min(8 * 1024)),
      capacity,
      dropped: 0,
    }
  }

  pub fn push(&mut self, chunk: &[u8]) {
    if self.capacity == 0 {
      self.dropped += chunk.len();
      return;
    }
    let chunk = if chunk.len() > self.capacity {
      self.dropped += chunk.len() - self.capacity;
      &chunk[chunk.len() - self.capacity..]
    } else {
      chunk
    };
    let overflow = (self.buf.len() + chunk.len()).saturating_sub(self.capacity);
    self.buf.drain(..overflow);
    self.dropped += overflow;
    self.buf.extend(chunk);
  }

  /// Number of bytes discarded from the front.
  pub fn dropped(&self) -> usize {
    self.dropped
  }

  pub fn is_empty(&self) -> bool {
    self.buf.is_empty()
  }

  /// Captured bytes as text, lossily decoded.
  pub fn to_string_lossy(&self) -> String {
    let (front, back) = self.buf.as_slices();
    let mut bytes = Vec::with_capacity(self.buf.len());
    bytes.extend_from_slice(front);
    bytes.extend_from_slice(back);
    String::from_utf8_lossy(&bytes).into_owned()
  }
}
