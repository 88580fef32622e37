//! The single-key execution unit shared by every caller that joins it.
//!
//! A `Flight` starts empty and is bound to the computation of the caller that
//! created it. The first caller to take its guard while the slot is empty runs
//! that computation; a success is always committed to the slot, a failure only
//! when the policy says so. Callers that find the slot populated return the
//! committed outcome without touching the guard.

use crate::error::Interrupted;
use crate::interrupt::Interrupt;
use crate::options::Options;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, MutexGuard};

/// How long an interruptible waiter blocks on the guard before re-checking its interrupt.
const INTERRUPT_POLL: Duration = Duration::from_millis(5);

/// The shared result of one execution. Both sides are reference counted so
/// every observer holds the very same allocation.
pub(crate) type Outcome<V, E> = Result<Arc<V>, Arc<E>>;

type Computation<V, E> = Box<dyn Fn() -> Result<V, E> + Send + Sync>;

/// What a single call to `execute` observed.
pub(crate) struct Settled<V, E> {
  pub(crate) outcome: Outcome<V, E>,
  /// This caller invoked the flight's computation.
  pub(crate) executed: bool,
  /// This caller committed a failure to the slot.
  pub(crate) memoized_failure: bool,
}

impl<V, E> Settled<V, E> {
  fn shared(outcome: &Outcome<V, E>) -> Self {
    Self {
      outcome: outcome.clone(),
      executed: false,
      memoized_failure: false,
    }
  }
}

pub(crate) struct Flight<V, E> {
  guard: Mutex<()>,
  slot: OnceCell<Outcome<V, E>>,
  cache_failure: bool,
  computation: Computation<V, E>,
}

impl<V, E> Flight<V, E> {
  pub(crate) fn new<F>(options: Options, computation: F) -> Self
  where
    F: Fn() -> Result<V, E> + Send + Sync + 'static,
  {
    Self {
      guard: Mutex::new(()),
      slot: OnceCell::new(),
      cache_failure: options.cache_failure(),
      computation: Box::new(computation),
    }
  }

  /// Whether an outcome has been committed.
  pub(crate) fn is_settled(&self) -> bool {
    self.slot.get().is_some()
  }

  /// Blocks until this caller can either reuse the committed outcome or run
  /// the flight's computation itself.
  pub(crate) fn execute(&self) -> Settled<V, E> {
    match self.execute_with(|guard| Ok::<_, Infallible>(guard.lock())) {
      Ok(settled) => settled,
      Err(never) => match never {},
    }
  }

  /// Like `execute`, but gives up waiting for the guard once `interrupt` is raised.
  pub(crate) fn execute_interruptible(
    &self,
    interrupt: &Interrupt,
  ) -> Result<Settled<V, E>, Interrupted> {
    self.execute_with(|guard| lock_interruptibly(guard, interrupt))
  }

  fn execute_with<'a, W, X>(&'a self, wait: W) -> Result<Settled<V, E>, X>
  where
    W: FnOnce(&'a Mutex<()>) -> Result<MutexGuard<'a, ()>, X>,
  {
    // Fast path: once settled, nobody needs the guard again.
    if let Some(outcome) = self.slot.get() {
      tracing::trace!("reusing committed outcome");
      return Ok(Settled::shared(outcome));
    }

    let _held = wait(&self.guard)?;

    // Another caller may have committed while we were waiting.
    if let Some(outcome) = self.slot.get() {
      tracing::trace!("outcome committed while waiting for the guard");
      return Ok(Settled::shared(outcome));
    }

    tracing::trace!("running computation");
    let outcome: Outcome<V, E> = match (self.computation)() {
      Ok(value) => Ok(Arc::new(value)),
      Err(failure) => Err(Arc::new(failure)),
    };

    let commit = outcome.is_ok() || self.cache_failure;
    if commit {
      // The slot is only written here, under the guard, after it was seen
      // empty, so `set` cannot lose a race.
      let _ = self.slot.set(outcome.clone());
    }
    if outcome.is_err() {
      if commit {
        tracing::debug!("computation failed; failure memoized for attached callers");
      } else {
        tracing::debug!("computation failed; failure not memoized");
      }
    }

    Ok(Settled {
      memoized_failure: commit && outcome.is_err(),
      outcome,
      executed: true,
    })
  }
}

fn lock_interruptibly<'a>(
  guard: &'a Mutex<()>,
  interrupt: &Interrupt,
) -> Result<MutexGuard<'a, ()>, Interrupted> {
  loop {
    if interrupt.is_interrupted() {
      return Err(Interrupted);
    }
    if let Some(held) = guard.try_lock_for(INTERRUPT_POLL) {
      return Ok(held);
    }
  }
}
