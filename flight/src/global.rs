//! The process-wide default coordinators and their access functions.

use crate::single_flight::SingleFlight;

use std::any::{Any, TypeId};
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

type Erased = Arc<dyn Any + Send + Sync>;

// One default coordinator per `(K, V, E)` signature, created on first use.
static DEFAULTS: Lazy<DashMap<TypeId, Erased>> = Lazy::new(DashMap::new);

/// Returns the process-wide default [`SingleFlight`] for this key, value and error type.
///
/// The default coordinator uses [`Options::DEFAULT`](crate::Options::DEFAULT).
/// Every caller asking for the same `K`, `V` and `E` shares one key space.
///
/// # Examples
///
/// ```
/// use fibre_flight::global;
/// use std::sync::Arc;
///
/// let a = global::<u64, String, std::io::Error>();
/// let b = global::<u64, String, std::io::Error>();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
pub fn global<K, V, E>() -> Arc<SingleFlight<K, V, E>>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  E: Send + Sync + 'static,
{
  let erased = DEFAULTS
    .entry(TypeId::of::<SingleFlight<K, V, E>>())
    .or_insert_with(|| Arc::new(SingleFlight::<K, V, E>::new()) as Erased)
    .clone();

  match erased.downcast::<SingleFlight<K, V, E>>() {
    Ok(flights) => flights,
    Err(_) => unreachable!("default coordinator is stored under its own TypeId"),
  }
}

/// Runs `computation` through the process-wide default coordinator.
///
/// Same contract as [`SingleFlight::run`].
///
/// # Examples
///
/// ```
/// let greeting = fibre_flight::run_default("greeting", || {
///   Ok::<_, std::io::Error>("hello".to_string())
/// });
/// assert_eq!(greeting.unwrap().as_str(), "hello");
/// ```
pub fn run_default<K, V, E, F>(key: K, computation: F) -> Result<Arc<V>, Arc<E>>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  E: Send + Sync + 'static,
  F: Fn() -> Result<V, E> + Send + Sync + 'static,
{
  global::<K, V, E>().run(key, computation)
}
