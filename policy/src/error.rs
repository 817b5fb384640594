use std::fmt;

/// Errors that can occur when building a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  /// The frequency estimator was configured with zero (or a negative number
  /// of) counters. The estimator needs at least one counter per row.
  ZeroCounters,
  /// The initial cost ceiling was negative.
  NegativeMaxCost,
  /// The eviction sample pool was configured with a size of zero, which
  /// would leave the eviction loop without candidates.
  ZeroSampleSize,
  /// The hit queue was configured with a capacity of zero batches.
  ZeroBufferItems,
  /// The operating system refused to start the background hit processor.
  WorkerSpawn(String),
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::ZeroCounters => write!(f, "number of counters must be positive"),
      BuildError::NegativeMaxCost => write!(f, "max cost cannot be negative"),
      BuildError::ZeroSampleSize => write!(f, "eviction sample size cannot be zero"),
      BuildError::ZeroBufferItems => write!(f, "hit buffer capacity cannot be zero"),
      BuildError::WorkerSpawn(reason) => {
        write!(f, "failed to spawn the hit processor thread: {}", reason)
      }
    }
  }
}

impl std::error::Error for BuildError {}
