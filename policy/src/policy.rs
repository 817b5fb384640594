use crate::builder::PolicyBuilder;
use crate::costs::{Candidate, CostTracker};
use crate::error::BuildError;
use crate::frequency::TinyLfu;
use crate::metrics::{MetricType, MetricsHandle};
use crate::task::processor::{HitBatch, HitProcessor};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fibre::mpsc;
use parking_lot::Mutex;

/// An entry evicted by [`Policy::add`].
///
/// The policy has already forgotten the key when a victim is returned. The
/// caller must remove it from storage, also when the admission that produced
/// it was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Victim {
  pub key: u64,
  /// Secondary key hash. Always 0; the policy tracks keys only.
  pub conflict: u64,
  pub cost: i64,
}

/// The unified mutable state of the policy, held under a single lock.
pub(crate) struct PolicyState {
  pub(crate) admit: TinyLfu,
  pub(crate) costs: CostTracker,
}

/// State shared between the policy handle and its hit processor.
pub(crate) struct PolicyShared {
  pub(crate) state: Mutex<PolicyState>,
}

/// The admission and eviction policy of a cost-bounded cache.
///
/// Writes go through [`add`](Policy::add), which decides synchronously whether
/// a key is admitted and which resident keys are evicted for it. Reads report
/// the keys they observed through [`push`](Policy::push), which never blocks;
/// a background thread applies those batches to the frequency estimator.
///
/// Every operation except `push` and `close` takes the same exclusive lock.
pub struct Policy {
  shared: Arc<PolicyShared>,
  sender: mpsc::BoundedSender<HitBatch>,
  processor: Mutex<Option<HitProcessor>>,
  is_closed: AtomicBool,
  sample_size: usize,
  metrics: MetricsHandle,
}

impl Policy {
  /// Creates a policy with the default sample size and hit buffer.
  ///
  /// `num_counters` sizes the frequency estimator and should be about ten
  /// times the number of items expected to be resident when the cache is full.
  pub fn new(num_counters: i64, max_cost: i64) -> Result<Self, BuildError> {
    PolicyBuilder::new(num_counters, max_cost).build()
  }

  /// Creates a policy that samples `sample_size` candidates per eviction.
  pub fn with_sample_size(
    num_counters: i64,
    max_cost: i64,
    sample_size: usize,
  ) -> Result<Self, BuildError> {
    PolicyBuilder::new(num_counters, max_cost)
      .sample_size(sample_size)
      .build()
  }

  /// Returns a builder for a policy with full control over its configuration.
  pub fn builder(num_counters: i64, max_cost: i64) -> PolicyBuilder {
    PolicyBuilder::new(num_counters, max_cost)
  }

  pub(crate) fn from_parts(
    shared: Arc<PolicyShared>,
    sender: mpsc::BoundedSender<HitBatch>,
    sample_size: usize,
    metrics: MetricsHandle,
  ) -> Self {
    Self {
      shared,
      sender,
      processor: Mutex::new(None),
      is_closed: AtomicBool::new(false),
      sample_size,
      metrics,
    }
  }

  pub(crate) fn shared(&self) -> &Arc<PolicyShared> {
    &self.shared
  }

  pub(crate) fn attach_processor(&self, processor: HitProcessor) {
    *self.processor.lock() = Some(processor);
  }

  /// Records a batch of accessed keys without blocking.
  ///
  /// Returns `false` if the batch was dropped because the hit queue is full,
  /// or because the policy is closed. An empty batch is accepted as a no-op.
  pub fn push(&self, keys: Vec<u64>) -> bool {
    if self.is_closed.load(Ordering::Acquire) {
      return false;
    }
    let Some(&first) = keys.first() else {
      return true;
    };

    let count = keys.len() as i64;
    match self.sender.try_send(keys) {
      Ok(()) => {
        self.metrics.add(MetricType::KeepGets, first, count);
        true
      }
      Err(_) => {
        self.metrics.add(MetricType::DropGets, first, count);
        tracing::trace!(keys = count, "hit queue full, dropping batch");
        false
      }
    }
  }

  /// Decides whether `key` with `cost` is admitted.
  ///
  /// Returns the evicted victims and whether the key was admitted. Victims
  /// are returned even when the admission is rejected: eviction stops at the
  /// first sampled key that is more valuable than the incoming one, and the
  /// keys evicted before that point are gone from the policy either way.
  ///
  /// A key that is already resident only has its cost updated and is
  /// reported as not admitted.
  pub fn add(&self, key: u64, cost: i64) -> (Vec<Victim>, bool) {
    let mut guard = self.shared.state.lock();
    let state = &mut *guard;

    // Cannot add an item bigger than the entire cache.
    if cost > state.costs.max_cost() {
      return (Vec::new(), false);
    }

    // An update does not count as an admission.
    if state.costs.update_if_has(key, cost) {
      return (Vec::new(), false);
    }

    let mut room = state.costs.room_left(cost);
    if room >= 0 {
      state.costs.add(key, cost);
      self.metrics.add(MetricType::CostAdded, key, cost);
      return (Vec::new(), true);
    }

    let incoming_hits = state.admit.estimate(key);
    let mut sample: Vec<Candidate> = Vec::with_capacity(self.sample_size);
    let mut victims = Vec::new();

    while room < 0 {
      state.costs.fill_sample(&mut sample, self.sample_size);

      // Linear scan; the first minimum wins ties. An empty sample keeps
      // `min_hits` at the maximum and rejects below.
      let (mut min_index, mut min_hits) = (0, i64::MAX);
      for (i, candidate) in sample.iter().enumerate() {
        let hits = state.admit.estimate(candidate.key);
        if hits < min_hits {
          min_index = i;
          min_hits = hits;
        }
      }

      if incoming_hits < min_hits {
        self.metrics.add(MetricType::RejectSets, key, 1);
        tracing::trace!(
          key,
          incoming_hits,
          min_hits,
          evicted = victims.len(),
          "admission rejected"
        );
        return (victims, false);
      }

      let victim = sample.swap_remove(min_index);
      let victim_cost = state.costs.del(victim.key).unwrap_or(victim.cost);
      self.metrics.add(MetricType::KeyEvicted, victim.key, 1);
      self.metrics.add(MetricType::CostEvicted, victim.key, victim_cost);
      victims.push(Victim {
        key: victim.key,
        conflict: 0,
        cost: victim_cost,
      });

      room = state.costs.room_left(cost);
    }

    state.costs.add(key, cost);
    self.metrics.add(MetricType::CostAdded, key, cost);
    (victims, true)
  }

  pub fn has(&self, key: u64) -> bool {
    self.shared.state.lock().costs.contains(key)
  }

  /// Forgets `key`. No-op if it is not resident.
  pub fn del(&self, key: u64) {
    self.shared.state.lock().costs.del(key);
  }

  /// Remaining room: max cost minus the used cost. Negative while the cache
  /// is over a lowered ceiling.
  pub fn cap(&self) -> i64 {
    let state = self.shared.state.lock();
    state.costs.max_cost().saturating_sub(state.costs.used())
  }

  /// Changes the cost of a resident key. Absent keys are ignored; growing a
  /// cost never evicts.
  pub fn update(&self, key: u64, cost: i64) {
    self.shared.state.lock().costs.update_if_has(key, cost);
  }

  /// The cost of a resident key, or `None` if the key is not resident.
  pub fn cost(&self, key: u64) -> Option<i64> {
    self.shared.state.lock().costs.get(key)
  }

  /// The sum of the costs of all resident keys.
  pub fn used(&self) -> i64 {
    self.shared.state.lock().costs.used()
  }

  /// The number of resident keys.
  pub fn len(&self) -> usize {
    self.shared.state.lock().costs.len()
  }

  /// Whether no key is resident.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// The current frequency estimate of `key`, as used by admission.
  pub fn estimate(&self, key: u64) -> i64 {
    self.shared.state.lock().admit.estimate(key)
  }

  /// Forgets every resident key and all frequency history.
  pub fn clear(&self) {
    let mut state = self.shared.state.lock();
    state.admit.clear();
    state.costs.clear();
  }

  /// The current capacity ceiling.
  pub fn max_cost(&self) -> i64 {
    self.shared.state.lock().costs.max_cost()
  }

  /// Changes the capacity ceiling. Resident keys are not evicted; the next
  /// admissions see the new ceiling.
  pub fn update_max_cost(&self, max_cost: i64) {
    self.shared.state.lock().costs.update_max_cost(max_cost);
  }

  /// Stops the hit processor and waits for it to exit. Later calls are
  /// no-ops, and `push` returns `false` from here on.
  pub fn close(&self) {
    if self
      .is_closed
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      return;
    }

    let processor = self.processor.lock().take();
    match processor {
      Some(processor) => processor.stop(&self.sender),
      None => {
        let _ = self.sender.close();
      }
    }
    tracing::debug!("policy closed");
  }

  /// Whether [`close`](Policy::close) has been called.
  pub fn is_closed(&self) -> bool {
    self.is_closed.load(Ordering::Acquire)
  }
}

impl Drop for Policy {
  fn drop(&mut self) {
    self.close();
  }
}

impl fmt::Debug for Policy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.shared.state.lock();
    f.debug_struct("Policy")
      .field("max_cost", &state.costs.max_cost())
      .field("used", &state.costs.used())
      .field("resident", &state.costs.len())
      .field("sample_size", &self.sample_size)
      .field("is_closed", &self.is_closed())
      .finish_non_exhaustive()
  }
}
