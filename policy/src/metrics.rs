use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// The counters the policy reports to its metrics collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
  /// Keys in hit batches that were accepted onto the hit queue.
  KeepGets,
  /// Keys in hit batches that were dropped because the hit queue was full.
  DropGets,
  /// Cost admitted into the policy. Updates of resident keys report their
  /// signed cost delta here as well.
  CostAdded,
  /// Admissions that lost the sampling contest against a resident key.
  RejectSets,
  /// Keys evicted to make room for an incoming key.
  KeyEvicted,
  /// Cost released by evictions.
  CostEvicted,
  /// Updates of already resident keys.
  KeyUpdated,
}

/// The metrics collaborator of a [`Policy`](crate::Policy).
///
/// Implementations must be cheap and must not block: `add` is called while the
/// policy lock is held and from the cache's read path.
pub trait MetricsSink: Send + Sync {
  /// Adds `delta` to the counter identified by `kind`. `key` is the key the
  /// event is about, for sinks that shard their counters by key.
  fn add(&self, kind: MetricType, key: u64, delta: i64);
}

/// A cheap, clonable handle to an optional metrics sink.
#[derive(Clone, Default)]
pub(crate) struct MetricsHandle(Option<Arc<dyn MetricsSink>>);

impl MetricsHandle {
  pub(crate) fn new(sink: Option<Arc<dyn MetricsSink>>) -> Self {
    Self(sink)
  }

  #[inline]
  pub(crate) fn add(&self, kind: MetricType, key: u64, delta: i64) {
    if let Some(sink) = &self.0 {
      sink.add(kind, key, delta);
    }
  }
}

impl fmt::Debug for MetricsHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("MetricsHandle")
      .field(&self.0.is_some())
      .finish()
  }
}

/// A thread-safe metrics collector for the policy.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub struct Metrics {
  // --- Hit Recording ---
  pub(crate) keep_gets: CachePadded<AtomicI64>,
  pub(crate) drop_gets: CachePadded<AtomicI64>,

  // --- Admission ---
  pub(crate) cost_added: CachePadded<AtomicI64>,
  pub(crate) reject_sets: CachePadded<AtomicI64>,
  pub(crate) keys_updated: CachePadded<AtomicI64>,

  // --- Eviction ---
  pub(crate) keys_evicted: CachePadded<AtomicI64>,
  pub(crate) cost_evicted: CachePadded<AtomicI64>,

  created_at: Instant,
}

// Manual implementation of Default to handle the non-default `Instant`.
impl Default for Metrics {
  fn default() -> Self {
    Self {
      keep_gets: CachePadded::new(AtomicI64::new(0)),
      drop_gets: CachePadded::new(AtomicI64::new(0)),
      cost_added: CachePadded::new(AtomicI64::new(0)),
      reject_sets: CachePadded::new(AtomicI64::new(0)),
      keys_updated: CachePadded::new(AtomicI64::new(0)),
      keys_evicted: CachePadded::new(AtomicI64::new(0)),
      cost_evicted: CachePadded::new(AtomicI64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub fn new() -> Self {
    Self::default()
  }

  fn counter(&self, kind: MetricType) -> &AtomicI64 {
    match kind {
      MetricType::KeepGets => &self.keep_gets,
      MetricType::DropGets => &self.drop_gets,
      MetricType::CostAdded => &self.cost_added,
      MetricType::RejectSets => &self.reject_sets,
      MetricType::KeyEvicted => &self.keys_evicted,
      MetricType::CostEvicted => &self.cost_evicted,
      MetricType::KeyUpdated => &self.keys_updated,
    }
  }

  /// Returns the current value of a single counter.
  pub fn get(&self, kind: MetricType) -> i64 {
    self.counter(kind).load(Ordering::Relaxed)
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub fn snapshot(&self) -> MetricsSnapshot {
    let keep_gets = self.keep_gets.load(Ordering::Relaxed);
    let drop_gets = self.drop_gets.load(Ordering::Relaxed);
    let total_gets = keep_gets + drop_gets;

    MetricsSnapshot {
      keep_gets,
      drop_gets,
      gets_kept_ratio: if total_gets == 0 {
        0.0
      } else {
        keep_gets as f64 / total_gets as f64
      },
      cost_added: self.cost_added.load(Ordering::Relaxed),
      reject_sets: self.reject_sets.load(Ordering::Relaxed),
      keys_updated: self.keys_updated.load(Ordering::Relaxed),
      keys_evicted: self.keys_evicted.load(Ordering::Relaxed),
      cost_evicted: self.cost_evicted.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }

  /// Resets every counter to zero. The uptime is not affected.
  pub fn clear(&self) {
    for counter in [
      &self.keep_gets,
      &self.drop_gets,
      &self.cost_added,
      &self.reject_sets,
      &self.keys_updated,
      &self.keys_evicted,
      &self.cost_evicted,
    ] {
      counter.store(0, Ordering::Relaxed);
    }
  }
}

impl MetricsSink for Metrics {
  #[inline]
  fn add(&self, kind: MetricType, _key: u64, delta: i64) {
    self.counter(kind).fetch_add(delta, Ordering::Relaxed);
  }
}

/// A point-in-time, public-facing snapshot of the policy's metrics.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
  /// The number of keys in hit batches accepted onto the hit queue.
  pub keep_gets: i64,
  /// The number of keys in hit batches dropped because the queue was full.
  pub drop_gets: i64,
  /// keep_gets / (keep_gets + drop_gets).
  pub gets_kept_ratio: f64,
  /// The net cost admitted, including update deltas.
  pub cost_added: i64,
  /// The number of admissions lost in the sampling contest.
  pub reject_sets: i64,
  /// The number of updates of resident keys.
  pub keys_updated: i64,
  /// The number of keys evicted to make room.
  pub keys_evicted: i64,
  /// The total cost released by evictions.
  pub cost_evicted: i64,
  /// The number of seconds since the metrics were created.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("keep_gets", &self.keep_gets)
      .field("drop_gets", &self.drop_gets)
      .field(
        "gets_kept_ratio",
        &format!("{:.2}%", self.gets_kept_ratio * 100.0),
      )
      .field("cost_added", &self.cost_added)
      .field("reject_sets", &self.reject_sets)
      .field("keys_updated", &self.keys_updated)
      .field("keys_evicted", &self.keys_evicted)
      .field("cost_evicted", &self.cost_evicted)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_counters_accumulate_signed_deltas() {
    let metrics = Metrics::new();
    metrics.add(MetricType::CostAdded, 1, 10);
    metrics.add(MetricType::CostAdded, 1, -4);
    metrics.add(MetricType::RejectSets, 2, 1);

    assert_eq!(metrics.get(MetricType::CostAdded), 6);
    assert_eq!(metrics.get(MetricType::RejectSets), 1);
    assert_eq!(metrics.get(MetricType::KeyEvicted), 0);
  }

  #[test]
  fn test_snapshot_ratio() {
    let metrics = Metrics::new();
    assert_eq!(metrics.snapshot().gets_kept_ratio, 0.0);

    metrics.add(MetricType::KeepGets, 1, 3);
    metrics.add(MetricType::DropGets, 1, 1);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.keep_gets, 3);
    assert_eq!(snapshot.drop_gets, 1);
    assert!((snapshot.gets_kept_ratio - 0.75).abs() < f64::EPSILON);
  }

  #[test]
  fn test_clear_resets_counters() {
    let metrics = Metrics::new();
    metrics.add(MetricType::KeyEvicted, 7, 2);
    metrics.clear();
    assert_eq!(metrics.get(MetricType::KeyEvicted), 0);
  }

  #[test]
  fn test_empty_handle_is_noop() {
    let handle = MetricsHandle::default();
    handle.add(MetricType::CostAdded, 1, 1);

    let metrics = Arc::new(Metrics::new());
    let handle = MetricsHandle::new(Some(metrics.clone()));
    handle.add(MetricType::CostAdded, 1, 5);
    assert_eq!(metrics.get(MetricType::CostAdded), 5);
  }
}
