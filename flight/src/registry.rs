//! The keyed map that matches concurrent callers to a shared flight.

use crate::flight::Flight;
use crate::options::Options;

use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// The result of `Registry::acquire`.
pub(crate) struct Acquired<V, E> {
  pub(crate) flight: Arc<Flight<V, E>>,
  /// The caller installed this flight rather than joining an existing one.
  pub(crate) created: bool,
}

pub(crate) struct Registry<K, V, E, S> {
  flights: DashMap<K, Arc<Flight<V, E>>, S>,
}

impl<K, V, E, S> Registry<K, V, E, S>
where
  K: Eq + Hash,
  S: BuildHasher + Clone,
{
  pub(crate) fn with_hasher(hasher: S) -> Self {
    Self {
      flights: DashMap::with_hasher(hasher),
    }
  }

  /// Returns the flight mapped to `key`, installing a fresh one bound to
  /// `computation` if there is none. A joining caller's `computation` is dropped.
  ///
  /// Only the key's shard is locked, and never across a computation.
  pub(crate) fn acquire<F>(&self, key: K, options: Options, computation: F) -> Acquired<V, E>
  where
    F: Fn() -> Result<V, E> + Send + Sync + 'static,
  {
    match self.flights.entry(key) {
      Entry::Occupied(entry) => Acquired {
        flight: entry.get().clone(),
        created: false,
      },
      Entry::Vacant(entry) => {
        let flight = Arc::new(Flight::new(options, computation));
        entry.insert(flight.clone());
        Acquired {
          flight,
          created: true,
        }
      }
    }
  }

  /// Removes the mapping for `key` only if it still points at `flight`.
  ///
  /// A newer flight installed for the same key after `flight` was removed is
  /// left alone. Returns whether this call removed the entry.
  pub(crate) fn release(&self, key: &K, flight: &Arc<Flight<V, E>>) -> bool {
    self
      .flights
      .remove_if(key, |_, mapped| Arc::ptr_eq(mapped, flight))
      .is_some()
  }

  pub(crate) fn len(&self) -> usize {
    self.flights.len()
  }
}

/// Releases a caller's flight from the registry when dropped, including
/// during a panic unwind out of the computation.
pub(crate) struct ReleaseGuard<'a, K, V, E, S>
where
  K: Eq + Hash,
  S: BuildHasher + Clone,
{
  registry: &'a Registry<K, V, E, S>,
  key: K,
  flight: Arc<Flight<V, E>>,
}

impl<'a, K, V, E, S> ReleaseGuard<'a, K, V, E, S>
where
  K: Eq + Hash,
  S: BuildHasher + Clone,
{
  pub(crate) fn new(registry: &'a Registry<K, V, E, S>, key: K, flight: Arc<Flight<V, E>>) -> Self {
    Self {
      registry,
      key,
      flight,
    }
  }

  pub(crate) fn flight(&self) -> &Flight<V, E> {
    &self.flight
  }
}

impl<K, V, E, S> Drop for ReleaseGuard<'_, K, V, E, S>
where
  K: Eq + Hash,
  S: BuildHasher + Clone,
{
  fn drop(&mut self) {
    let removed = self.registry.release(&self.key, &self.flight);
    if std::thread::panicking() {
      tracing::warn!(removed, "releasing flight while unwinding from a panicked computation");
    } else {
      tracing::trace!(removed, settled = self.flight.is_settled(), "released flight");
    }
  }
}
