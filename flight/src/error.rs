use std::sync::Arc;

use thiserror::Error;

/// The error returned by [`SingleFlight::run_interruptible`](crate::SingleFlight::run_interruptible).
///
/// `run` never needs this type: it hands back the computation's own shared
/// failure as `Err(Arc<E>)`.
#[derive(Debug, Error)]
pub enum FlightError<E> {
  /// The computation failed. Every caller that observed this failure from the
  /// same flight holds the same allocation, so `Arc::ptr_eq` identifies it.
  #[error("computation failed: {0}")]
  Failed(Arc<E>),

  /// The caller's [`Interrupt`](crate::Interrupt) was raised while it was
  /// waiting for another caller's execution to finish.
  #[error("interrupted while waiting for an in-flight computation")]
  Interrupted,
}

impl<E> FlightError<E> {
  /// Returns `true` if this is a wait interruption rather than a computation failure.
  pub fn is_interrupted(&self) -> bool {
    matches!(self, FlightError::Interrupted)
  }

  /// Returns the shared computation failure, if any.
  pub fn into_failure(self) -> Option<Arc<E>> {
    match self {
      FlightError::Failed(e) => Some(e),
      FlightError::Interrupted => None,
    }
  }
}

impl<E> Clone for FlightError<E> {
  fn clone(&self) -> Self {
    match self {
      FlightError::Failed(e) => FlightError::Failed(e.clone()),
      FlightError::Interrupted => FlightError::Interrupted,
    }
  }
}

impl<E> From<Arc<E>> for FlightError<E> {
  fn from(failure: Arc<E>) -> Self {
    FlightError::Failed(failure)
  }
}

/// Marker for a guard wait abandoned because the caller's interrupt was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Interrupted;

impl<E> From<Interrupted> for FlightError<E> {
  fn from(_: Interrupted) -> Self {
    FlightError::Interrupted
  }
}
