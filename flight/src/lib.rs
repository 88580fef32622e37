//! # Fibre Flight
//!
//! Keyed call deduplication for blocking, multi-threaded code.
//!
//! When many threads ask for the same expensive, fallible result at the same
//! time (a cache-miss stampede, a burst of identical downstream calls),
//! `fibre_flight` lets exactly one of them run the computation while the
//! others wait and receive the identical outcome.
//!
//! ## Core Concepts
//!
//! - **Flight**: one shared attempt to compute the result for a key. Callers
//!   that arrive while it is registered join it instead of starting their own.
//! - **SingleFlight**: the coordinator. It maps keys to flights and removes a
//!   flight as soon as any attached caller returns, so sharing is limited to
//!   genuinely concurrent calls. It never keeps results around.
//! - **Options**: the one policy knob, `cache_failure`, which decides whether
//!   a failure is shared with the other attached callers.
//! - **Default instance**: [`run_default`] forwards to a lazily created,
//!   process-wide coordinator.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_flight::{Options, SingleFlight};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let flights: Arc<SingleFlight<&'static str, String, String>> =
//!   Arc::new(SingleFlight::with_options(Options::builder().cache_failure(true).build()));
//! let loads = Arc::new(AtomicUsize::new(0));
//!
//! let handles: Vec<_> = (0..4)
//!   .map(|_| {
//!     let flights = flights.clone();
//!     let loads = loads.clone();
//!     thread::spawn(move || {
//!       flights.run("config", move || {
//!         loads.fetch_add(1, Ordering::SeqCst);
//!         Ok("loaded".to_string())
//!       })
//!     })
//!   })
//!   .collect();
//!
//! for handle in handles {
//!   assert_eq!(handle.join().unwrap().unwrap().as_str(), "loaded");
//! }
//! // Between 1 and 4 loads, depending on how the threads overlapped.
//! assert!((1..=4).contains(&loads.load(Ordering::SeqCst)));
//! assert_eq!(flights.in_flight(), 0);
//! ```

mod flight;
mod registry;

pub mod error;
pub mod global;
pub mod interrupt;
pub mod metrics;
pub mod options;
pub mod single_flight;

pub use error::FlightError;
pub use global::{global, run_default};
pub use interrupt::Interrupt;
pub use metrics::MetricsSnapshot;
pub use options::{Options, OptionsBuilder};
pub use single_flight::SingleFlight;
