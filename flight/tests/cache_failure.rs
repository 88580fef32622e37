mod common;

use common::{race, LoadError};
use fibre_flight::{Options, SingleFlight};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Barrier,
};
use std::thread;
use std::time::Duration;

type Flights = SingleFlight<&'static str, String, LoadError>;

fn flights(cache_failure: bool) -> Arc<Flights> {
  Arc::new(SingleFlight::with_options(
    Options::builder().cache_failure(cache_failure).build(),
  ))
}

/// Five callers start within a 50ms window; the computation sleeps 100ms
/// and then fails. Returns the execution count and every caller's result.
fn failing_burst(
  flights: &Arc<Flights>,
  key: &'static str,
) -> (usize, Vec<Result<Arc<String>, Arc<LoadError>>>) {
  let executions = Arc::new(AtomicUsize::new(0));

  let results = race(5, Duration::from_millis(10), {
    let flights = flights.clone();
    let executions = executions.clone();
    move |_| {
      let executions = executions.clone();
      flights.run(key, move || {
        executions.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        Err(LoadError::new("backend unavailable"))
      })
    }
  });

  (executions.load(Ordering::SeqCst), results)
}

#[test]
fn test_default_options_do_not_cache_failures() {
  let flights = Flights::new();
  assert!(!flights.options().cache_failure());
}

#[test]
fn test_failures_not_cached_every_caller_executes() {
  let flights = flights(false);

  let (executions, results) = failing_burst(&flights, "k");

  // Serialized on the shared flight, but never deduplicated.
  assert_eq!(executions, 5);
  assert_eq!(results.len(), 5);
  for result in &results {
    let failure = result.as_ref().unwrap_err();
    assert_eq!(failure.0, "backend unavailable");
  }

  let metrics = flights.metrics();
  assert_eq!(metrics.executions, 5);
  assert_eq!(metrics.failures, 5);
  assert_eq!(metrics.memoized_failures, 0);
  assert_eq!(flights.in_flight(), 0);
}

#[test]
fn test_failures_cached_only_first_caller_executes() {
  let flights = flights(true);

  let (executions, results) = failing_burst(&flights, "k");

  assert_eq!(executions, 1);
  assert_eq!(results.len(), 5);
  let first = results[0].as_ref().unwrap_err().clone();
  for result in &results {
    // The identical failure instance, not merely an equal one.
    assert!(Arc::ptr_eq(result.as_ref().unwrap_err(), &first));
  }

  let metrics = flights.metrics();
  assert_eq!(metrics.executions, 1);
  assert_eq!(metrics.memoized_failures, 1);
  assert_eq!(metrics.shared_outcomes, 4);
  assert_eq!(flights.in_flight(), 0);
}

#[test]
fn test_sequential_failures_always_execute_regardless_of_setting() {
  for cache_failure in [false, true] {
    let flights = flights(cache_failure);
    let executions = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
      let executions = executions.clone();
      let result = flights.run("sequential", move || {
        executions.fetch_add(1, Ordering::SeqCst);
        Err(LoadError::new("nope"))
      });
      assert!(result.is_err());
    }

    assert_eq!(
      executions.load(Ordering::SeqCst),
      2,
      "cache_failure={} leaked a failure across calls",
      cache_failure
    );
  }
}

#[test]
fn test_cached_failure_does_not_affect_later_success() {
  let flights = flights(true);

  let (executions, results) = failing_burst(&flights, "flaky");
  assert_eq!(executions, 1);
  assert!(results.iter().all(|r| r.is_err()));

  // A second, non-overlapping burst gets a fresh flight.
  let successes = Arc::new(AtomicUsize::new(0));
  let results = race(5, Duration::ZERO, {
    let flights = flights.clone();
    let successes = successes.clone();
    move |_| {
      let successes = successes.clone();
      flights.run("flaky", move || {
        thread::sleep(Duration::from_millis(100));
        successes.fetch_add(1, Ordering::SeqCst);
        Ok("success-result".to_string())
      })
    }
  });

  assert_eq!(successes.load(Ordering::SeqCst), 1);
  for result in &results {
    assert_eq!(result.as_ref().unwrap().as_str(), "success-result");
  }
}

#[test]
fn test_success_does_not_affect_later_failure_caching() {
  let flights = flights(true);
  let successes = Arc::new(AtomicUsize::new(0));

  let results = race(5, Duration::ZERO, {
    let flights = flights.clone();
    let successes = successes.clone();
    move |_| {
      let successes = successes.clone();
      flights.run("mixed", move || {
        thread::sleep(Duration::from_millis(100));
        successes.fetch_add(1, Ordering::SeqCst);
        Ok("initial-success".to_string())
      })
    }
  });
  assert_eq!(successes.load(Ordering::SeqCst), 1);
  assert!(results
    .iter()
    .all(|r| r.as_ref().unwrap().as_str() == "initial-success"));

  let (executions, results) = failing_burst(&flights, "mixed");
  assert_eq!(executions, 1);
  let first = results[0].as_ref().unwrap_err().clone();
  assert!(results
    .iter()
    .all(|r| Arc::ptr_eq(r.as_ref().unwrap_err(), &first)));
}

#[test]
fn test_caching_is_independent_per_key() {
  let flights = flights(true);

  let (failing_runs, failing) = failing_burst(&flights, "failing-key");
  let succeeding_runs = Arc::new(AtomicUsize::new(0));
  let ok = flights.run("succeeding-key", {
    let succeeding_runs = succeeding_runs.clone();
    move || {
      succeeding_runs.fetch_add(1, Ordering::SeqCst);
      Ok("fine".to_string())
    }
  });

  assert_eq!(failing_runs, 1);
  assert!(failing.iter().all(|r| r.is_err()));
  assert_eq!(succeeding_runs.load(Ordering::SeqCst), 1);
  assert_eq!(ok.unwrap().as_str(), "fine");
}

#[test]
fn test_rerun_after_failure_uses_the_first_callers_computation() {
  let flights = flights(false);
  let leader_attempts = Arc::new(AtomicUsize::new(0));
  let follower_runs = Arc::new(AtomicUsize::new(0));
  let leader_running = Arc::new(Barrier::new(2));

  let leader = {
    let flights = flights.clone();
    let leader_attempts = leader_attempts.clone();
    let leader_running = leader_running.clone();
    thread::spawn(move || {
      flights.run("k", move || {
        if leader_attempts.fetch_add(1, Ordering::SeqCst) == 0 {
          leader_running.wait();
          thread::sleep(Duration::from_millis(200));
        }
        Err(LoadError::new("leader computation failed"))
      })
    })
  };

  // The leader holds the flight's guard; this call joins its flight.
  leader_running.wait();
  let follower = flights.run("k", {
    let follower_runs = follower_runs.clone();
    move || {
      follower_runs.fetch_add(1, Ordering::SeqCst);
      Ok("follower computation".to_string())
    }
  });

  let leader = leader.join().unwrap();
  assert_eq!(leader.unwrap_err().0, "leader computation failed");
  // The failure was not shared, so the follower re-ran the flight's computation.
  assert_eq!(follower.unwrap_err().0, "leader computation failed");
  assert_eq!(leader_attempts.load(Ordering::SeqCst), 2);
  assert_eq!(follower_runs.load(Ordering::SeqCst), 0);
  assert_eq!(flights.metrics().flights_created, 1);
}
