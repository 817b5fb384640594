#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};

use fibre_policy::Policy;

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
  let deadline = Instant::now() + timeout;
  while Instant::now() < deadline {
    if condition() {
      return true;
    }
    thread::sleep(Duration::from_millis(1));
  }
  condition()
}

/// Pushes a batch, retrying while the hit queue is full.
pub fn push_until_accepted(policy: &Policy, keys: &[u64]) {
  let accepted = wait_until(Duration::from_secs(5), || policy.push(keys.to_vec()));
  assert!(accepted, "hit queue never drained");
}

/// Sum of the costs of all `keys` that are resident.
pub fn resident_cost(policy: &Policy, keys: impl IntoIterator<Item = u64>) -> i64 {
  keys.into_iter().filter_map(|key| policy.cost(key)).sum()
}
