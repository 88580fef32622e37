//! Immutable policy for a [`SingleFlight`](crate::SingleFlight) instance.

use core::fmt;

/// Configuration for a [`SingleFlight`](crate::SingleFlight).
///
/// `Options` is a small `Copy` value; every flight created by a coordinator
/// carries its own copy, so changing policy means building a new coordinator.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Options {
  /// Whether a failed outcome is memoized for the other callers attached to
  /// the same flight. Successful outcomes are always memoized.
  #[cfg_attr(feature = "serde", serde(default))]
  cache_failure: bool,
}

impl Options {
  /// The default policy: failures are not memoized.
  pub const DEFAULT: Options = Options {
    cache_failure: false,
  };

  /// Returns a builder starting from the default policy.
  pub fn builder() -> OptionsBuilder {
    OptionsBuilder::default()
  }

  /// Returns a builder pre-populated with this policy.
  pub fn to_builder(&self) -> OptionsBuilder {
    OptionsBuilder {
      cache_failure: self.cache_failure,
    }
  }

  /// Whether failed outcomes are memoized.
  pub fn cache_failure(&self) -> bool {
    self.cache_failure
  }
}

impl fmt::Debug for Options {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Options")
      .field("cache_failure", &self.cache_failure)
      .finish()
  }
}

/// A builder for [`Options`].
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
  cache_failure: bool,
}

impl OptionsBuilder {
  /// Sets whether a failed outcome is shared with every caller still attached
  /// to the flight that produced it.
  ///
  /// When `false` (the default), callers that were waiting on the same flight
  /// each run the flight's computation again, one at a time.
  pub fn cache_failure(mut self, cache_failure: bool) -> Self {
    self.cache_failure = cache_failure;
    self
  }

  /// Builds the immutable `Options`.
  pub fn build(self) -> Options {
    Options {
      cache_failure: self.cache_failure,
    }
  }
}
