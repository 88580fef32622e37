//! A cooperative interruption flag for callers blocked on a flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shareable flag that abandons a caller's wait on an in-flight computation.
///
/// Clones share the same flag, so one thread can hold the `Interrupt` passed to
/// [`SingleFlight::run_interruptible`](crate::SingleFlight::run_interruptible)
/// and another can raise it. Raising the flag only affects callers that are
/// still waiting for a flight's guard; a computation that is already running
/// is never cancelled.
///
/// The flag stays raised after it has interrupted a wait. Call [`clear`](Self::clear)
/// to reuse it.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
  raised: Arc<AtomicBool>,
}

impl Interrupt {
  pub fn new() -> Self {
    Self::default()
  }

  /// Raises the flag.
  pub fn interrupt(&self) {
    self.raised.store(true, Ordering::Release);
  }

  pub fn is_interrupted(&self) -> bool {
    self.raised.load(Ordering::Acquire)
  }

  /// Lowers the flag, returning whether it was raised.
  pub fn clear(&self) -> bool {
    self.raised.swap(false, Ordering::AcqRel)
  }
}
