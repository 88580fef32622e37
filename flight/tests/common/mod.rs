#![allow(dead_code)]

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// A computation failure used across the integration tests.
#[derive(Debug, PartialEq, Eq)]
pub struct LoadError(pub String);

impl LoadError {
  pub fn new(message: impl Into<String>) -> Self {
    LoadError(message.into())
  }
}

impl fmt::Display for LoadError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "load failed: {}", self.0)
  }
}

impl Error for LoadError {}

/// Spawns `threads` workers that all pass a barrier before worker `i` sleeps
/// `stagger * i` and calls `work(i)`. Returns each worker's join result in order.
pub fn race_joined<T, F>(threads: usize, stagger: Duration, work: F) -> Vec<thread::Result<T>>
where
  T: Send + 'static,
  F: Fn(usize) -> T + Send + Sync + 'static,
{
  let work = Arc::new(work);
  let barrier = Arc::new(Barrier::new(threads));

  let handles: Vec<_> = (0..threads)
    .map(|i| {
      let work = work.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        if !stagger.is_zero() {
          thread::sleep(stagger * i as u32);
        }
        work(i)
      })
    })
    .collect();

  handles.into_iter().map(|handle| handle.join()).collect()
}

/// Like `race_joined`, but panics if any worker panicked.
pub fn race<T, F>(threads: usize, stagger: Duration, work: F) -> Vec<T>
where
  T: Send + 'static,
  F: Fn(usize) -> T + Send + Sync + 'static,
{
  race_joined(threads, stagger, work)
    .into_iter()
    .map(|joined| joined.expect("worker thread panicked"))
    .collect()
}
