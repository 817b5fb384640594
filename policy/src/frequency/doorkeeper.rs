use std::f64::consts::LN_2;

/// Target false-positive rate of the doorkeeper.
const FALSE_POSITIVE_RATE: f64 = 0.01;

/// A bloom filter recording which keys have been seen once since the last
/// aging pass.
#[derive(Debug)]
pub(crate) struct Doorkeeper {
  bits: Vec<u64>,
  num_bits: u64,
  num_hashes: u32,
  hasher: ahash::RandomState,
}

impl Doorkeeper {
  /// Creates a filter sized for `expected_items` keys.
  pub fn new(expected_items: usize) -> Self {
    let n = expected_items.max(1) as f64;
    let num_bits = (-n * FALSE_POSITIVE_RATE.ln() / (LN_2 * LN_2)).ceil() as u64;
    // Round up to whole words.
    let num_bits = num_bits.max(64).div_ceil(64) * 64;
    let num_hashes = ((num_bits as f64 / n) * LN_2).round().clamp(1.0, 16.0) as u32;
    Self {
      bits: vec![0; (num_bits / 64) as usize],
      num_bits,
      num_hashes,
      hasher: ahash::RandomState::new(),
    }
  }

  /// Double hashing: probe `i` lands on bit `(h1 + i * h2) % num_bits`.
  #[inline]
  fn probes(&self, key: u64) -> (u64, u64) {
    let hash = self.hasher.hash_one(key);
    // A zero step would collapse every probe onto the same bit.
    (hash & 0xffff_ffff, (hash >> 32) | 1)
  }

  #[inline]
  fn bit(&self, h1: u64, h2: u64, i: u64) -> (usize, u64) {
    let bit = h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits;
    ((bit / 64) as usize, 1 << (bit % 64))
  }

  pub fn contains(&self, key: u64) -> bool {
    let (h1, h2) = self.probes(key);
    (0..self.num_hashes as u64).all(|i| {
      let (word, mask) = self.bit(h1, h2, i);
      self.bits[word] & mask != 0
    })
  }

  /// Sets the key's bits. Returns `true` if at least one bit was previously
  /// unset, i.e. the key was not (probably) present before.
  pub fn insert(&mut self, key: u64) -> bool {
    let (h1, h2) = self.probes(key);
    let mut newly_added = false;
    for i in 0..self.num_hashes as u64 {
      let (word, mask) = self.bit(h1, h2, i);
      if self.bits[word] & mask == 0 {
        self.bits[word] |= mask;
        newly_added = true;
      }
    }
    newly_added
  }

  pub fn clear(&mut self) {
    self.bits.fill(0);
  }
}
