//! Approximate access-frequency tracking in fixed memory.
//!
//! [`TinyLfu`] combines a 4-bit Count-Min Sketch with a doorkeeper bloom
//! filter. A key's first access inside an aging window only sets its
//! doorkeeper bits; later accesses reach the sketch. One-shot keys therefore
//! never consume counter space, and the estimate of a key that was seen at
//! least once is its sketch minimum plus one.
//!
//! After `num_counters` recorded accesses the sketch is halved and the
//! doorkeeper is cleared, so estimates follow recent traffic.

mod doorkeeper;
mod sketch;

use doorkeeper::Doorkeeper;
use sketch::CountMinSketch;

/// The admission filter: a frequency estimator gated by a doorkeeper.
#[derive(Debug)]
pub(crate) struct TinyLfu {
  sketch: CountMinSketch,
  door: Doorkeeper,
  increments: usize,
  reset_at: usize,
}

impl TinyLfu {
  pub fn new(num_counters: usize) -> Self {
    let num_counters = num_counters.max(1);
    Self {
      sketch: CountMinSketch::new(num_counters),
      door: Doorkeeper::new(num_counters),
      increments: 0,
      reset_at: num_counters,
    }
  }

  /// Returns the approximate number of accesses to `key` in the current
  /// window. Never exceeds `MAX_COUNT + 1`.
  pub fn estimate(&self, key: u64) -> i64 {
    let mut hits = self.sketch.estimate(key) as i64;
    if self.door.contains(key) {
      hits += 1;
    }
    hits
  }

  /// Applies a batch of observed accesses in order.
  pub fn record(&mut self, keys: &[u64]) {
    for &key in keys {
      self.increment(key);
    }
  }

  pub fn increment(&mut self, key: u64) {
    // The first sighting only flips the doorkeeper bits.
    if !self.door.insert(key) {
      self.sketch.increment(key);
    }
    self.increments += 1;
    if self.increments >= self.reset_at {
      self.age();
    }
  }

  fn age(&mut self) {
    tracing::trace!(increments = self.increments, "aging frequency estimator");
    self.increments = 0;
    self.door.clear();
    self.sketch.age();
  }

  pub fn clear(&mut self) {
    self.increments = 0;
    self.door.clear();
    self.sketch.clear();
  }
}
