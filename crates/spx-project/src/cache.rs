use std::fmt;
use std::sync::OnceLock;

use crate::error::Result;
use crate::kind::Artifact;

/// One memoized `(kind, key)` slot.
///
/// An entry is created pending, transitions to built exactly once through
/// [`CacheEntry::force`], and is treated as immutable afterwards;
/// invalidation drops the entry from the owning map instead of editing it.
/// Errors are published the same way as values, so repeated queries return
/// the cached failure without re-running the builder.
pub(crate) struct CacheEntry {
    outcome: OnceLock<Result<Artifact>>,
    generation: u64,
}

impl CacheEntry {
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            outcome: OnceLock::new(),
            generation,
        }
    }

    /// The owning project's generation when this entry was created. Always
    /// at most the project's current generation.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Run `build` if the entry is still pending; otherwise wait on the
    /// latch and share the published outcome.
    ///
    /// The closure runs while holding only this entry's latch, never a
    /// cache-wide lock, so unrelated entries stay fully available. A builder
    /// re-entering the cache for its *own* entry deadlocks; builder cycles
    /// are a programming error, not a runtime concern.
    pub(crate) fn force(&self, build: impl FnOnce() -> Result<Artifact>) -> Result<Artifact> {
        self.outcome.get_or_init(build).clone()
    }

    pub(crate) fn is_built(&self) -> bool {
        self.outcome.get().is_some()
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("generation", &self.generation)
            .field("built", &self.is_built())
            .finish()
    }
}
