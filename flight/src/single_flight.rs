use crate::error::FlightError;
use crate::interrupt::Interrupt;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::options::Options;
use crate::registry::{Registry, ReleaseGuard};

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

/// A keyed call-deduplication coordinator.
///
/// Concurrent calls to [`run`](Self::run) with equal keys share a single
/// *flight*: the first caller to get the flight's guard runs the computation,
/// and every caller still attached to that flight observes the committed
/// outcome, down to the same `Arc` allocation.
///
/// The flight is removed from the registry as soon as any attached caller
/// returns, so the sharing window is bounded by genuine concurrency. A call
/// that starts after a previous call for the same key has returned always gets
/// a fresh flight and runs again. This is not a cache.
///
/// A flight is bound to the computation of the caller that created it; the
/// computations passed by callers that join it are dropped unused.
///
/// Successes are always shared with attached callers. Failures are shared only
/// when [`Options::cache_failure`] is set; otherwise each attached caller runs
/// the flight's computation again in turn, never two at once. A panic is never
/// shared: it unwinds to the caller whose execution panicked.
///
/// # Examples
///
/// ```
/// use fibre_flight::SingleFlight;
///
/// let flights: SingleFlight<String, String, std::io::Error> = SingleFlight::new();
///
/// let user = flights.run("user:123".to_string(), || {
///   // An expensive lookup that concurrent callers would otherwise repeat.
///   Ok("Ada".to_string())
/// });
/// assert_eq!(user.unwrap().as_str(), "Ada");
/// ```
pub struct SingleFlight<K, V, E, S = ahash::RandomState> {
  options: Options,
  registry: Registry<K, V, E, S>,
  metrics: Metrics,
}

impl<K, V, E> SingleFlight<K, V, E, ahash::RandomState>
where
  K: Eq + Hash + Clone,
{
  /// Creates a coordinator with the default policy.
  pub fn new() -> Self {
    Self::with_options(Options::default())
  }

  /// Creates a coordinator with the given policy.
  pub fn with_options(options: Options) -> Self {
    Self::with_hasher(options, ahash::RandomState::new())
  }
}

impl<K, V, E> Default for SingleFlight<K, V, E, ahash::RandomState>
where
  K: Eq + Hash + Clone,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V, E, S> SingleFlight<K, V, E, S>
where
  K: Eq + Hash + Clone,
  S: BuildHasher + Clone,
{
  /// Creates a coordinator with the given policy and key hasher.
  pub fn with_hasher(options: Options, hasher: S) -> Self {
    Self {
      options,
      registry: Registry::with_hasher(hasher),
      metrics: Metrics::new(),
    }
  }

  /// Runs `computation` for `key`, or shares the outcome of a concurrent call
  /// for the same key.
  ///
  /// If a flight for `key` is already registered, this call joins it and
  /// `computation` is dropped without being called. Blocks while another
  /// caller attached to the same flight is executing. Returns the shared
  /// value, or the shared failure exactly as the computation produced it.
  ///
  /// # Panics
  ///
  /// Resumes the panic if the flight's computation panics while this caller
  /// runs it. The flight is still released and nothing is memoized.
  pub fn run<F>(&self, key: K, computation: F) -> Result<Arc<V>, Arc<E>>
  where
    F: Fn() -> Result<V, E> + Send + Sync + 'static,
  {
    let guard = self.attach(key, computation);
    let settled = guard.flight().execute();
    self.record(settled.executed, settled.memoized_failure, &settled.outcome);
    settled.outcome
  }

  /// Like [`run`](Self::run), but stops waiting once `interrupt` is raised.
  ///
  /// A caller that still needs the flight's guard when `interrupt` is (or
  /// becomes) raised returns [`FlightError::Interrupted`] without running
  /// anything. The interrupt stays raised. Other callers on the same flight are
  /// unaffected, and a computation that is already running is never cancelled.
  pub fn run_interruptible<F>(
    &self,
    key: K,
    interrupt: &Interrupt,
    computation: F,
  ) -> Result<Arc<V>, FlightError<E>>
  where
    F: Fn() -> Result<V, E> + Send + Sync + 'static,
  {
    let guard = self.attach(key, computation);
    match guard.flight().execute_interruptible(interrupt) {
      Ok(settled) => {
        self.record(settled.executed, settled.memoized_failure, &settled.outcome);
        settled.outcome.map_err(FlightError::Failed)
      }
      Err(interrupted) => {
        Metrics::incr(&self.metrics.interrupted_waits);
        tracing::debug!("interrupted while waiting for an in-flight computation");
        Err(interrupted.into())
      }
    }
  }

  /// The policy this coordinator was built with.
  pub fn options(&self) -> Options {
    self.options
  }

  /// The number of keys that currently have a registered flight.
  pub fn in_flight(&self) -> usize {
    self.registry.len()
  }

  /// Returns a point-in-time snapshot of this coordinator's counters.
  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot(self.registry.len())
  }

  fn attach<F>(&self, key: K, computation: F) -> ReleaseGuard<'_, K, V, E, S>
  where
    F: Fn() -> Result<V, E> + Send + Sync + 'static,
  {
    Metrics::incr(&self.metrics.calls);
    let acquired = self.registry.acquire(key.clone(), self.options, computation);
    if acquired.created {
      Metrics::incr(&self.metrics.flights_created);
      tracing::trace!("created flight");
    } else {
      tracing::trace!("joined in-flight computation");
    }
    ReleaseGuard::new(&self.registry, key, acquired.flight)
  }

  fn record(&self, executed: bool, memoized_failure: bool, outcome: &Result<Arc<V>, Arc<E>>) {
    if executed {
      Metrics::incr(&self.metrics.executions);
      if outcome.is_err() {
        Metrics::incr(&self.metrics.failures);
      }
      if memoized_failure {
        Metrics::incr(&self.metrics.memoized_failures);
      }
    } else {
      Metrics::incr(&self.metrics.shared_outcomes);
    }
  }
}

impl<K, V, E, S> fmt::Debug for SingleFlight<K, V, E, S>
where
  K: Eq + Hash,
  S: BuildHasher + Clone,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SingleFlight")
      .field("options", &self.options)
      .field("in_flight", &self.registry.len())
      .finish_non_exhaustive()
  }
}
