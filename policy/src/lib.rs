//! The admission and eviction policy engine for a concurrent, cost-bounded
//! in-memory cache.
//!
//! # Features
//! - **TinyLFU Admission**: Access frequencies are estimated in fixed memory
//!   by a 4-bit Count-Min Sketch behind a doorkeeper bloom filter, aged
//!   periodically so estimates follow recent traffic.
//! - **Sampled LFU Eviction**: Victims are the least frequent keys of a small
//!   random sample, so eviction costs O(sample size) per victim.
//! - **Cost Aware**: Every key carries a cost; the policy keeps the total cost
//!   under a ceiling that can be changed at runtime.
//! - **Non-blocking Reads**: Read-path hits are queued with a non-blocking
//!   `push` and applied by a background thread. A full queue sheds batches.
//! - **Observability**: Reports its counters to a pluggable [`MetricsSink`].
//!
//! # Storage contract
//! The policy only tracks keys and costs. Every [`Victim`] returned by
//! [`Policy::add`] must be removed from storage by the caller, including the
//! victims of an admission that was ultimately rejected.

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod metrics;
pub mod policy;

// Internal, crate-only modules
mod costs;
mod frequency;
mod task;

// Re-export the primary user-facing types for convenience
pub use builder::{PolicyBuilder, DEFAULT_BUFFER_ITEMS, DEFAULT_SAMPLE_SIZE};
pub use error::BuildError;
pub use metrics::{MetricType, Metrics, MetricsSink, MetricsSnapshot};
pub use policy::{Policy, Victim};
