use crate::policy::PolicyShared;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use fibre::mpsc;

/// A batch of observed key accesses.
pub(crate) type HitBatch = Vec<u64>;

/// The background task that applies hit batches to the frequency estimator.
///
/// Batches are applied in queue order under the policy lock, so they are
/// serialized against admissions.
pub(crate) struct HitProcessor {
  handle: JoinHandle<()>,
  stop_flag: Arc<AtomicBool>,
}

impl HitProcessor {
  /// Spawns a new hit processor thread.
  pub(crate) fn spawn(
    shared: Arc<PolicyShared>,
    receiver: mpsc::BoundedReceiver<HitBatch>,
  ) -> io::Result<Self> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_clone = stop_flag.clone();

    let handle = thread::Builder::new()
      .name("fibre-policy-hits".into())
      .spawn(move || {
        tracing::debug!("hit processor started");
        // `recv` fails once the sender is closed and the queue is drained.
        while let Ok(keys) = receiver.recv() {
          // A stop request wins over queued work.
          if stop_clone.load(Ordering::Acquire) {
            break;
          }
          shared.state.lock().admit.record(&keys);
        }
        tracing::debug!("hit processor stopped");
      })?;

    Ok(Self { handle, stop_flag })
  }

  /// Signals the thread to stop and waits until it has exited. At most the
  /// batch that is being applied right now still reaches the estimator.
  pub(crate) fn stop(self, sender: &mpsc::BoundedSender<HitBatch>) {
    self.stop_flag.store(true, Ordering::Release);
    // Closing the only sender wakes a receiver blocked on an empty queue.
    let _ = sender.close();
    if self.handle.join().is_err() {
      tracing::warn!("hit processor panicked before shutdown");
    }
  }
}
