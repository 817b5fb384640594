use crate::costs::CostTracker;
use crate::error::BuildError;
use crate::frequency::TinyLfu;
use crate::metrics::{MetricsHandle, MetricsSink};
use crate::policy::{Policy, PolicyShared, PolicyState};
use crate::task::processor::{HitBatch, HitProcessor};

use core::fmt;
use std::sync::Arc;

use fibre::mpsc;
use parking_lot::Mutex;

/// The number of resident keys sampled per eviction round.
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

/// The number of hit batches that may wait for the hit processor.
pub const DEFAULT_BUFFER_ITEMS: usize = 3;

/// A builder for creating [`Policy`] instances.
pub struct PolicyBuilder {
  pub(crate) num_counters: i64,
  pub(crate) max_cost: i64,
  pub(crate) sample_size: usize,
  pub(crate) buffer_items: usize,
  metrics: Option<Arc<dyn MetricsSink>>,
}

// Manual Debug implementation for PolicyBuilder.
impl fmt::Debug for PolicyBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PolicyBuilder")
      .field("num_counters", &self.num_counters)
      .field("max_cost", &self.max_cost)
      .field("sample_size", &self.sample_size)
      .field("buffer_items", &self.buffer_items)
      .field("has_metrics", &self.metrics.is_some())
      .finish()
  }
}

impl PolicyBuilder {
  /// Starts a configuration with the two required parameters.
  ///
  /// `num_counters` is the number of frequency counters per sketch row, and
  /// also the number of recorded accesses between two aging passes.
  /// `max_cost` is the initial capacity ceiling.
  pub fn new(num_counters: i64, max_cost: i64) -> Self {
    Self {
      num_counters,
      max_cost,
      sample_size: DEFAULT_SAMPLE_SIZE,
      buffer_items: DEFAULT_BUFFER_ITEMS,
      metrics: None,
    }
  }

  /// Sets the number of resident keys compared per eviction round.
  pub fn sample_size(mut self, sample_size: usize) -> Self {
    self.sample_size = sample_size;
    self
  }

  /// Sets how many hit batches may be queued before `push` starts dropping.
  pub fn buffer_items(mut self, buffer_items: usize) -> Self {
    self.buffer_items = buffer_items;
    self
  }

  /// Sets the metrics collaborator. Without one, metrics are not recorded.
  pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  /// Builds the policy and starts its hit processor thread.
  pub fn build(self) -> Result<Policy, BuildError> {
    let (policy, receiver) = self.assemble()?;
    let processor = HitProcessor::spawn(Arc::clone(policy.shared()), receiver)
      .map_err(|e| BuildError::WorkerSpawn(e.to_string()))?;
    policy.attach_processor(processor);
    Ok(policy)
  }

  /// Validates the configuration and wires up everything except the hit
  /// processor. The caller owns the receiving end of the hit queue.
  pub(crate) fn assemble(
    self,
  ) -> Result<(Policy, mpsc::BoundedReceiver<HitBatch>), BuildError> {
    self.validate()?;

    let metrics = MetricsHandle::new(self.metrics);
    let shared = Arc::new(PolicyShared {
      state: Mutex::new(PolicyState {
        admit: TinyLfu::new(self.num_counters as usize),
        costs: CostTracker::new(self.max_cost, metrics.clone()),
      }),
    });

    let (sender, receiver) = mpsc::bounded(self.buffer_items);
    let policy = Policy::from_parts(shared, sender, self.sample_size, metrics);
    Ok((policy, receiver))
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.num_counters <= 0 {
      return Err(BuildError::ZeroCounters);
    }
    if self.max_cost < 0 {
      return Err(BuildError::NegativeMaxCost);
    }
    if self.sample_size == 0 {
      return Err(BuildError::ZeroSampleSize);
    }
    if self.buffer_items == 0 {
      return Err(BuildError::ZeroBufferItems);
    }
    Ok(())
  }
}
