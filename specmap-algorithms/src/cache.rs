//! Single-slot cache for analysis results.
//!
//! An entry is reused only while both its parameter key and the spectra
//! generation it was computed from still match.

use specmap_core::{Error, Result};

#[derive(Debug, Clone)]
struct Entry<K, T> {
    key: K,
    generation: u64,
    value: T,
}

/// Cached analysis result keyed on parameters and data generation.
#[derive(Debug, Clone)]
pub struct AnalysisCache<K, T> {
    entry: Option<Entry<K, T>>,
}

impl<K, T> Default for AnalysisCache<K, T> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<K: PartialEq, T> AnalysisCache<K, T> {
    /// True when a result for `key` at `generation` is cached.
    #[must_use]
    pub fn is_fresh(&self, key: &K, generation: u64) -> bool {
        matches!(&self.entry, Some(e) if e.key == *key && e.generation == generation)
    }

    /// True when any result has been computed, fresh or not.
    #[must_use]
    pub fn is_calculated(&self) -> bool {
        self.entry.is_some()
    }

    /// Most recent result, regardless of freshness.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.entry.as_ref().map(|e| &e.value)
    }

    /// Returns the cached value, running `compute` first when forced or stale.
    ///
    /// A failed computation leaves the previous entry in place.
    ///
    /// # Errors
    /// Propagates the error from `compute`.
    pub fn get_or_try_insert_with<F>(
        &mut self,
        key: K,
        generation: u64,
        recalculate: bool,
        compute: F,
    ) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if recalculate || !self.is_fresh(&key, generation) {
            let value = compute()?;
            self.entry = Some(Entry {
                key,
                generation,
                value,
            });
        }
        self.get()
            .ok_or_else(|| Error::Decomposition("analysis cache is empty".into()))
    }

    /// Drops the cached result.
    pub fn clear(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuses_until_key_or_generation_changes() {
        let mut cache: AnalysisCache<usize, usize> = AnalysisCache::default();
        let mut runs = 0;
        let mut run = |cache: &mut AnalysisCache<usize, usize>, key, generation, force| {
            *cache
                .get_or_try_insert_with(key, generation, force, || {
                    runs += 1;
                    Ok(key * 10)
                })
                .unwrap()
        };
        assert_eq!(run(&mut cache, 3, 0, false), 30);
        assert_eq!(run(&mut cache, 3, 0, false), 30);
        assert_eq!(run(&mut cache, 4, 0, false), 40);
        assert_eq!(run(&mut cache, 4, 1, false), 40);
        assert_eq!(run(&mut cache, 4, 1, true), 40);
        assert_eq!(runs, 4);
    }

    #[test]
    fn test_failure_keeps_previous_entry() {
        let mut cache: AnalysisCache<(), u8> = AnalysisCache::default();
        cache.get_or_try_insert_with((), 0, false, || Ok(1)).unwrap();
        let err = cache.get_or_try_insert_with((), 1, false, || {
            Err(Error::Decomposition("boom".into()))
        });
        assert!(err.is_err());
        assert_eq!(cache.get(), Some(&1));
        assert!(!cache.is_fresh(&(), 1));
    }
}
