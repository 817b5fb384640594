use std::hash::{BuildHasher, Hash, Hasher};

/// The number of rows in the sketch. Each key maps to one counter per row.
const DEPTH: usize = 4;

/// The largest value a 4-bit counter can hold.
pub(crate) const MAX_COUNT: u8 = 15;

/// Rows are never narrower than this many counters.
const MIN_WIDTH: usize = 16;

/// A Count-Min Sketch of 4-bit saturating counters, packed two per byte.
///
/// Plain counters: synchronization is handled by the owning policy's mutex.
#[derive(Debug)]
pub(crate) struct CountMinSketch {
  rows: [Vec<u8>; DEPTH],
  hashers: [ahash::RandomState; DEPTH],
  mask: u64,
}

impl CountMinSketch {
  /// Creates a sketch with `num_counters` counters per row, rounded up to the
  /// next power of two.
  pub fn new(num_counters: usize) -> Self {
    let width = num_counters.max(MIN_WIDTH).next_power_of_two();
    Self {
      rows: std::array::from_fn(|_| vec![0u8; width / 2]),
      hashers: std::array::from_fn(|_| ahash::RandomState::new()),
      mask: (width - 1) as u64,
    }
  }

  /// The number of counters per row.
  #[cfg(test)]
  pub fn width(&self) -> usize {
    self.mask as usize + 1
  }

  #[inline]
  fn index(&self, row: usize, key: u64) -> usize {
    let mut hasher = self.hashers[row].build_hasher();
    key.hash(&mut hasher);
    (hasher.finish() & self.mask) as usize
  }

  /// Increments the key's counter in every row, saturating at `MAX_COUNT`.
  pub fn increment(&mut self, key: u64) {
    for row in 0..DEPTH {
      let n = self.index(row, key);
      let shift = (n & 1) * 4;
      let byte = &mut self.rows[row][n / 2];
      if (*byte >> shift) & 0x0f < MAX_COUNT {
        *byte += 1 << shift;
      }
    }
  }

  /// Returns the minimum of the key's counters across all rows.
  pub fn estimate(&self, key: u64) -> u8 {
    let mut min_count = MAX_COUNT;
    for row in 0..DEPTH {
      let n = self.index(row, key);
      let count = (self.rows[row][n / 2] >> ((n & 1) * 4)) & 0x0f;
      min_count = min_count.min(count);
    }
    min_count
  }

  /// Halves every counter.
  pub fn age(&mut self) {
    for row in &mut self.rows {
      for byte in row.iter_mut() {
        // Shifting the packed pair moves each high nibble's low bit into the
        // low nibble's top bit; the mask drops it.
        *byte = (*byte >> 1) & 0x77;
      }
    }
  }

  pub fn clear(&mut self) {
    for row in &mut self.rows {
      row.fill(0);
    }
  }
}
