use crate::metrics::{MetricType, MetricsHandle};

use rand::Rng;
use std::collections::HashMap;

/// An eviction candidate drawn from the resident keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Candidate {
  pub(crate) key: u64,
  pub(crate) cost: i64,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
  cost: i64,
  // Position of the key in `CostTracker::keys`.
  index: usize,
}

/// Exact cost accounting for every resident key.
///
/// Keys live both in a map (for lookups) and in a dense vector (for uniform
/// random sampling and O(1) swap-removal). `used` is always the sum of all
/// resident costs.
#[derive(Debug)]
pub(crate) struct CostTracker {
  key_costs: HashMap<u64, Slot>,
  keys: Vec<u64>,
  used: i64,
  max_cost: i64,
  metrics: MetricsHandle,
}

impl CostTracker {
  pub fn new(max_cost: i64, metrics: MetricsHandle) -> Self {
    Self {
      key_costs: HashMap::new(),
      keys: Vec::new(),
      used: 0,
      max_cost,
      metrics,
    }
  }

  pub fn max_cost(&self) -> i64 {
    self.max_cost
  }

  /// Changes the capacity ceiling. Never evicts; only future room checks
  /// observe the new value.
  pub fn update_max_cost(&mut self, max_cost: i64) {
    self.max_cost = max_cost;
  }

  pub fn used(&self) -> i64 {
    self.used
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }

  pub fn contains(&self, key: u64) -> bool {
    self.key_costs.contains_key(&key)
  }

  pub fn get(&self, key: u64) -> Option<i64> {
    self.key_costs.get(&key).map(|slot| slot.cost)
  }

  /// Room left after admitting `cost`. Negative means evictions are needed.
  /// Saturates at the `i64` bounds.
  pub fn room_left(&self, cost: i64) -> i64 {
    self.max_cost.saturating_sub(self.used).saturating_sub(cost)
  }

  /// If `key` is resident, replaces its cost and returns `true`. Evictions
  /// for a grown cost are left to the next admission.
  pub fn update_if_has(&mut self, key: u64, cost: i64) -> bool {
    let Some(slot) = self.key_costs.get_mut(&key) else {
      return false;
    };

    let delta = cost.saturating_sub(slot.cost);
    slot.cost = cost;
    self.used = self.used.saturating_add(delta);

    self.metrics.add(MetricType::KeyUpdated, key, 1);
    if delta != 0 {
      self.metrics.add(MetricType::CostAdded, key, delta);
    }
    true
  }

  /// Starts tracking a new resident key. The caller must have checked that
  /// the key is not resident already.
  pub fn add(&mut self, key: u64, cost: i64) {
    debug_assert!(!self.contains(key), "key {} is already resident", key);
    self.key_costs.insert(
      key,
      Slot {
        cost,
        index: self.keys.len(),
      },
    );
    self.keys.push(key);
    self.used = self.used.saturating_add(cost);
  }

  /// Stops tracking `key`, returning its cost if it was resident.
  pub fn del(&mut self, key: u64) -> Option<i64> {
    let slot = self.key_costs.remove(&key)?;
    self.keys.swap_remove(slot.index);
    // Repoint the key that moved into the freed position.
    if let Some(&moved) = self.keys.get(slot.index) {
      if let Some(moved_slot) = self.key_costs.get_mut(&moved) {
        moved_slot.index = slot.index;
      }
    }
    self.used = self.used.saturating_sub(slot.cost);
    Some(slot.cost)
  }

  /// Tops `sample` up to `target` candidates with resident keys it does not
  /// contain yet. Comes up short only when fewer keys are resident.
  pub fn fill_sample(&self, sample: &mut Vec<Candidate>, target: usize) {
    let resident = self.keys.len();
    if sample.len() >= target || sample.len() >= resident {
      return;
    }

    let mut rng = rand::rng();

    // Uniform draws with rejection of duplicates. The number of draws is
    // bounded; whatever is still missing is filled by a scan below.
    let mut draws = target * 4;
    while sample.len() < target && draws > 0 {
      draws -= 1;
      let key = self.keys[rng.random_range(0..resident)];
      if !sample.iter().any(|c| c.key == key) {
        sample.push(self.candidate(key));
      }
    }

    // Walk the keys from a random offset.
    let start = rng.random_range(0..resident);
    for i in 0..resident {
      if sample.len() >= target {
        break;
      }
      let key = self.keys[(start + i) % resident];
      if !sample.iter().any(|c| c.key == key) {
        sample.push(self.candidate(key));
      }
    }
  }

  fn candidate(&self, key: u64) -> Candidate {
    Candidate {
      key,
      cost: self.key_costs.get(&key).map_or(0, |slot| slot.cost),
    }
  }

  pub fn clear(&mut self) {
    self.key_costs.clear();
    self.keys.clear();
    self.used = 0;
  }

  /// Checks the internal invariants. Test-only, O(n).
  #[cfg(test)]
  pub(crate) fn validate(&self) {
    assert_eq!(self.key_costs.len(), self.keys.len());
    for (i, key) in self.keys.iter().enumerate() {
      assert_eq!(self.key_costs[key].index, i);
    }
    let sum: i64 = self.key_costs.values().map(|slot| slot.cost).sum();
    assert_eq!(self.used, sum);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::metrics::Metrics;
  use std::collections::HashSet;
  use std::sync::Arc;

  fn tracker(max_cost: i64) -> CostTracker {
    CostTracker::new(max_cost, MetricsHandle::default())
  }

  #[test]
  fn test_add_and_room() {
    let mut costs = tracker(10);
    assert_eq!(costs.room_left(4), 6);
    costs.add(1, 4);
    assert_eq!(costs.used(), 4);
    assert_eq!(costs.room_left(6), 0);
    assert_eq!(costs.room_left(7), -1);
    costs.validate();
  }

  #[test]
  fn test_room_left_near_i64_max() {
    let mut costs = tracker(i64::MAX);
    costs.add(1, 1);
    assert_eq!(costs.room_left(i64::MAX), -1);
    assert_eq!(costs.room_left(i64::MAX - 1), 0);

    assert!(costs.update_if_has(1, i64::MAX));
    assert_eq!(costs.used(), i64::MAX);
    assert_eq!(costs.room_left(1), -1);

    assert_eq!(costs.del(1), Some(i64::MAX));
    assert_eq!(costs.used(), 0);
    assert_eq!(costs.room_left(i64::MAX), 0);
    costs.add(2, i64::MAX);
    assert_eq!(costs.used(), i64::MAX);
    costs.validate();
  }

  #[test]
  fn test_update_if_has() {
    let metrics = Arc::new(Metrics::new());
    let mut costs = CostTracker::new(10, MetricsHandle::new(Some(metrics.clone())));

    assert!(!costs.update_if_has(1, 3), "Absent key must not be updated");
    assert_eq!(costs.used(), 0);

    costs.add(1, 5);
    assert!(costs.update_if_has(1, 8));
    assert_eq!(costs.used(), 8);
    assert_eq!(costs.get(1), Some(8));

    assert!(costs.update_if_has(1, 2));
    assert_eq!(costs.used(), 2);

    assert_eq!(metrics.get(MetricType::KeyUpdated), 2);
    assert_eq!(metrics.get(MetricType::CostAdded), -3);
    costs.validate();
  }

  #[test]
  fn test_del_keeps_index_consistent() {
    let mut costs = tracker(100);
    for key in 0..10 {
      costs.add(key, key as i64 + 1);
    }
    assert_eq!(costs.del(3), Some(4));
    assert_eq!(costs.del(0), Some(1));
    assert_eq!(costs.del(9), Some(10));
    assert_eq!(costs.del(42), None);
    assert_eq!(costs.len(), 7);
    assert!(!costs.contains(3));
    costs.validate();
  }

  #[test]
  fn test_update_max_cost_does_not_evict() {
    let mut costs = tracker(10);
    costs.add(1, 8);
    costs.update_max_cost(5);
    assert_eq!(costs.max_cost(), 5);
    assert!(costs.contains(1));
    assert_eq!(costs.room_left(0), -3);
  }

  #[test]
  fn test_fill_sample_distinct_and_bounded() {
    let mut costs = tracker(1000);
    for key in 0..20 {
      costs.add(key, 1);
    }

    let mut sample = Vec::new();
    costs.fill_sample(&mut sample, 5);
    assert_eq!(sample.len(), 5);
    let distinct: HashSet<u64> = sample.iter().map(|c| c.key).collect();
    assert_eq!(distinct.len(), 5);

    // Topping up an already full sample is a no-op.
    let before = sample.clone();
    costs.fill_sample(&mut sample, 5);
    assert_eq!(sample, before);
  }

  #[test]
  fn test_fill_sample_with_few_residents() {
    let mut costs = tracker(1000);
    costs.add(1, 3);
    costs.add(2, 4);

    let mut sample = vec![Candidate { key: 1, cost: 3 }];
    costs.fill_sample(&mut sample, 5);
    assert_eq!(sample.len(), 2);
    assert!(sample.contains(&Candidate { key: 2, cost: 4 }));

    let mut empty = Vec::new();
    tracker(10).fill_sample(&mut empty, 5);
    assert!(empty.is_empty());
  }

  #[test]
  fn test_fill_sample_covers_all_keys_eventually() {
    let mut costs = tracker(1000);
    for key in 0..10 {
      costs.add(key, 1);
    }
    let mut seen = HashSet::new();
    for _ in 0..500 {
      let mut sample = Vec::new();
      costs.fill_sample(&mut sample, 1);
      seen.insert(sample[0].key);
    }
    assert_eq!(seen.len(), 10, "Sampling should not be stuck on a subset");
  }

  #[test]
  fn test_clear() {
    let mut costs = tracker(10);
    costs.add(1, 2);
    costs.add(2, 3);
    costs.clear();
    assert_eq!(costs.used(), 0);
    assert_eq!(costs.len(), 0);
    assert!(!costs.contains(1));
    costs.validate();
  }
}
