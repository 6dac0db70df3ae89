use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::Result;

/// Identifies one load: which source, and with which parameters
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey {
    pub identity: String,
    pub params: String,
}

impl SourceKey {
    pub fn new(identity: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            params: params.into(),
        }
    }

    /// A file read without parameters
    pub fn file(path: &Path) -> Self {
        Self::new(path.display().to_string(), "")
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            f.write_str(&self.identity)
        } else {
            write!(f, "{}[{}]", self.identity, self.params)
        }
    }
}

/// Memoised loads, shared out as immutable `Arc`s.
///
/// A value is never modified once stored. Reloading goes through [`LoadCache::invalidate`] or
/// [`LoadCache::clear`], each of which bumps the generation so holders of an old value can tell
/// it was superseded.
#[derive(Debug)]
pub struct LoadCache<V> {
    entries: HashMap<SourceKey, Arc<V>>,
    generation: u64,
}

impl<V> Default for LoadCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            generation: 0,
        }
    }
}

impl<V> LoadCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &SourceKey) -> Option<Arc<V>> {
        self.entries.get(key).cloned()
    }

    /// Return the stored value for `key`, running `load` only on a miss.
    ///
    /// A failed load stores nothing, so the next call retries it.
    ///
    /// # Errors
    /// Propagates the error of `load`.
    pub fn get_or_load(&mut self, key: SourceKey, load: impl FnOnce() -> Result<V>) -> Result<Arc<V>> {
        if let Some(value) = self.entries.get(&key) {
            tracing::debug!(source = %key, "cache hit");
            return Ok(Arc::clone(value));
        }

        tracing::debug!(source = %key, "cache miss");
        let value = Arc::new(load()?);
        self.entries.insert(key, Arc::clone(&value));
        Ok(value)
    }

    /// Drop every entry loaded from `identity`, whatever its parameters
    pub fn invalidate(&mut self, identity: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.identity != identity);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            self.generation += 1;
            tracing::info!(source = identity, dropped, "invalidated cached loads");
        }
        dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Arc;

    use super::{LoadCache, SourceKey};
    use crate::Error;

    #[test]
    fn second_load_of_the_same_key_is_a_hit() {
        let mut cache = LoadCache::new();
        let loads = Cell::new(0);
        let load = || {
            loads.set(loads.get() + 1);
            Ok(vec![1, 2, 3])
        };

        let first = cache.get_or_load(SourceKey::new("bangu.csv", ""), load).unwrap();
        let second = cache.get_or_load(SourceKey::new("bangu.csv", ""), load).unwrap();

        assert_eq!(loads.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn parameters_are_part_of_the_key() {
        let mut cache = LoadCache::new();
        cache
            .get_or_load(SourceKey::new("sus", "330455"), || Ok(1))
            .unwrap();
        cache
            .get_or_load(SourceKey::new("sus", "330490"), || Ok(2))
            .unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(*cache.get(&SourceKey::new("sus", "330490")).unwrap(), 2);
    }

    #[test]
    fn failed_loads_are_not_stored() {
        let mut cache: LoadCache<u32> = LoadCache::new();
        let key = SourceKey::new("missing.csv", "");

        let err = cache.get_or_load(key.clone(), || Err(Error::Config("boom".into())));
        assert!(err.is_err());
        assert!(cache.is_empty());

        assert_eq!(*cache.get_or_load(key, || Ok(7)).unwrap(), 7);
    }

    #[test]
    fn invalidation_reloads_and_leaves_old_values_intact() {
        let mut cache = LoadCache::new();
        let old = cache
            .get_or_load(SourceKey::new("tijuca.csv", ""), || Ok(String::from("old")))
            .unwrap();
        cache
            .get_or_load(SourceKey::new("centro.csv", ""), || Ok(String::from("kept")))
            .unwrap();

        assert_eq!(cache.invalidate("tijuca.csv"), 1);
        assert_eq!(cache.generation(), 1);
        assert_eq!(cache.invalidate("tijuca.csv"), 0);
        assert_eq!(cache.generation(), 1);

        let new = cache
            .get_or_load(SourceKey::new("tijuca.csv", ""), || Ok(String::from("new")))
            .unwrap();
        assert_eq!(old.as_str(), "old");
        assert_eq!(new.as_str(), "new");
        assert!(cache.get(&SourceKey::new("centro.csv", "")).is_some());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.generation(), 2);
    }
}
