use std::hash::Hash;

use sieve_cache::SieveCache;

use crate::error::Result;

/// A size-bounded cache. Capacity zero turns it into a pass-through.
pub struct BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    inner: Option<SieveCache<K, V>>,
    hits: u64,
    misses: u64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        // SieveCache rejects a zero capacity; that is the disabled case.
        Self {
            inner: SieveCache::new(capacity).ok(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        let found = self.inner.as_mut().and_then(|c| c.get(key).cloned());
        match found {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        found
    }

    pub fn insert(&mut self, key: K, value: V) {
        if let Some(cache) = self.inner.as_mut() {
            cache.insert(key, value);
        }
    }

    pub fn get_or_try_insert_with<F>(&mut self, key: &K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key.clone(), value.clone());
        Ok(value)
    }

    pub fn clear(&mut self) {
        if let Some(cache) = self.inner.as_mut() {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// Config sizes are signed; anything not positive disables the cache.
pub fn capacity_from(size: i64) -> usize {
    usize::try_from(size).unwrap_or(0)
}
