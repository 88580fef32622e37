use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for a `SingleFlight`.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub(crate) struct Metrics {
  // --- Calls ---
  pub(crate) calls: CachePadded<AtomicU64>,
  pub(crate) flights_created: CachePadded<AtomicU64>,

  // --- Executions ---
  pub(crate) executions: CachePadded<AtomicU64>,
  pub(crate) shared_outcomes: CachePadded<AtomicU64>,

  // --- Failures ---
  pub(crate) failures: CachePadded<AtomicU64>,
  pub(crate) memoized_failures: CachePadded<AtomicU64>,
  pub(crate) interrupted_waits: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      calls: CachePadded::new(AtomicU64::new(0)),
      flights_created: CachePadded::new(AtomicU64::new(0)),
      executions: CachePadded::new(AtomicU64::new(0)),
      shared_outcomes: CachePadded::new(AtomicU64::new(0)),
      failures: CachePadded::new(AtomicU64::new(0)),
      memoized_failures: CachePadded::new(AtomicU64::new(0)),
      interrupted_waits: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn incr(counter: &CachePadded<AtomicU64>) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot. `in_flight` is read from the registry
  /// by the caller since it is not a counter.
  pub(crate) fn snapshot(&self, in_flight: usize) -> MetricsSnapshot {
    MetricsSnapshot {
      calls: self.calls.load(Ordering::Relaxed),
      flights_created: self.flights_created.load(Ordering::Relaxed),
      executions: self.executions.load(Ordering::Relaxed),
      shared_outcomes: self.shared_outcomes.load(Ordering::Relaxed),
      failures: self.failures.load(Ordering::Relaxed),
      memoized_failures: self.memoized_failures.load(Ordering::Relaxed),
      interrupted_waits: self.interrupted_waits.load(Ordering::Relaxed),
      in_flight: in_flight as u64,
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of a `SingleFlight`'s metrics.
#[derive(Clone, PartialEq)]
pub struct MetricsSnapshot {
  /// The number of calls to `run` or `run_interruptible`.
  pub calls: u64,
  /// The number of calls that installed a new flight (the rest joined one).
  pub flights_created: u64,
  /// The number of times a computation was actually invoked.
  pub executions: u64,
  /// The number of calls answered from a flight's memoized outcome.
  pub shared_outcomes: u64,
  /// The number of computations that returned an error.
  pub failures: u64,
  /// The number of failures that were memoized for other callers.
  pub memoized_failures: u64,
  /// The number of callers whose wait was abandoned through an `Interrupt`.
  pub interrupted_waits: u64,
  /// The number of keys with a registered flight at snapshot time.
  pub in_flight: u64,
  /// The number of seconds since the `SingleFlight` was created.
  pub uptime_secs: u64,
}

impl MetricsSnapshot {
  /// The share of calls that reused an outcome instead of executing.
  pub fn dedup_ratio(&self) -> f64 {
    if self.calls == 0 {
      0.0
    } else {
      self.shared_outcomes as f64 / self.calls as f64
    }
  }
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("calls", &self.calls)
      .field("flights_created", &self.flights_created)
      .field("executions", &self.executions)
      .field("shared_outcomes", &self.shared_outcomes)
      .field("dedup_ratio", &format!("{:.2}%", self.dedup_ratio() * 100.0))
      .field("failures", &self.failures)
      .field("memoized_failures", &self.memoized_failures)
      .field("interrupted_waits", &self.interrupted_waits)
      .field("in_flight", &self.in_flight)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
