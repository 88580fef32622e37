use fibre_flight::{Options, SingleFlight};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// Simulates a slow backend that every request thread wants to hit at once.
static BACKEND_CALLS: AtomicUsize = AtomicUsize::new(0);

fn fetch_user(id: u32) -> Result<String, String> {
  BACKEND_CALLS.fetch_add(1, Ordering::SeqCst);
  thread::sleep(Duration::from_millis(150));
  if id == 0 {
    Err("user 0 does not exist".to_string())
  } else {
    Ok(format!("user-{}", id))
  }
}

fn burst(flights: &Arc<SingleFlight<u32, String, String>>, id: u32, requests: usize) {
  let barrier = Arc::new(Barrier::new(requests));
  let handles: Vec<_> = (0..requests)
    .map(|_| {
      let flights = flights.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        flights.run(id, move || fetch_user(id))
      })
    })
    .collect();

  for handle in handles {
    match handle.join().unwrap() {
      Ok(user) => println!("  got {}", user),
      Err(e) => println!("  failed: {}", e),
    }
  }
}

fn main() {
  // Set RUST_LOG=fibre_flight=trace to watch flights being created and joined.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_thread_names(true)
    .init();

  let flights = Arc::new(SingleFlight::with_options(
    Options::builder().cache_failure(true).build(),
  ));

  println!("--- 10 concurrent requests for user 42 ---");
  burst(&flights, 42, 10);
  println!("backend calls so far: {}", BACKEND_CALLS.load(Ordering::SeqCst));

  println!("--- 10 concurrent requests for missing user 0 (failures shared) ---");
  burst(&flights, 0, 10);
  println!("backend calls so far: {}", BACKEND_CALLS.load(Ordering::SeqCst));

  println!("--- a later request for user 42 runs again; this is not a cache ---");
  burst(&flights, 42, 1);
  println!("backend calls so far: {}", BACKEND_CALLS.load(Ordering::SeqCst));

  println!("{:#?}", flights.metrics());
}
