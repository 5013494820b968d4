use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::{
    attr::{Attribute, AttributeValueSet, Hierarchy},
    context::cache::BoundedCache,
    source::{AttributesSource, HierarchySource},
};

pub const DEFAULT_USER_CACHE_SIZE: usize = 50;
pub const DEFAULT_HIERARCHY_CACHE_SIZE: usize = 5;
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(5 * 60);

struct Timed<V> {
    at: Instant,
    value: V,
}

impl<V: Clone> Clone for Timed<V> {
    fn clone(&self) -> Self {
        Timed {
            at: self.at,
            value: self.value.clone(),
        }
    }
}

/// Cross-request cache in front of another attribute source.
/// Entries expire a fixed time after they were fetched.
pub struct AttributesStoreCache<S> {
    inner: S,
    users: Mutex<BoundedCache<String, Timed<Option<AttributeValueSet>>>>,
    hierarchies: Mutex<BoundedCache<Attribute, Timed<Option<Arc<Hierarchy>>>>>,
    user_expiry: Duration,
    hierarchy_expiry: Duration,
}

impl<S: AttributesSource> AttributesStoreCache<S> {
    pub fn new(inner: S) -> Self {
        Self::with_limits(
            inner,
            DEFAULT_EXPIRY,
            DEFAULT_EXPIRY,
            DEFAULT_USER_CACHE_SIZE,
            DEFAULT_HIERARCHY_CACHE_SIZE,
        )
    }

    pub fn with_limits(
        inner: S,
        user_expiry: Duration,
        hierarchy_expiry: Duration,
        user_cache_size: usize,
        hierarchy_cache_size: usize,
    ) -> Self {
        Self {
            inner,
            users: Mutex::new(BoundedCache::new(user_cache_size)),
            hierarchies: Mutex::new(BoundedCache::new(hierarchy_cache_size)),
            user_expiry,
            hierarchy_expiry,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop every cached entry.
    pub fn invalidate(&self) {
        self.users.lock().clear();
        self.hierarchies.lock().clear();
    }
}

fn fresh<V: Clone>(entry: Option<Timed<V>>, expiry: Duration) -> Option<V> {
    entry
        .filter(|e| e.at.elapsed() < expiry)
        .map(|e| e.value)
}

impl<S: AttributesSource> HierarchySource for AttributesStoreCache<S> {
    fn hierarchy(&self, attribute: &Attribute) -> Option<Arc<Hierarchy>> {
        let cached = self.hierarchies.lock().get(attribute);
        if let Some(value) = fresh(cached, self.hierarchy_expiry) {
            return value;
        }
        // Not under the lock: the inner source may be slow.
        let value = self.inner.hierarchy(attribute);
        self.hierarchies.lock().insert(
            attribute.clone(),
            Timed {
                at: Instant::now(),
                value: value.clone(),
            },
        );
        value
    }
}

impl<S: AttributesSource> AttributesSource for AttributesStoreCache<S> {
    fn attributes(&self, user: &str) -> Option<AttributeValueSet> {
        let key = user.to_string();
        let cached = self.users.lock().get(&key);
        if let Some(value) = fresh(cached, self.user_expiry) {
            return value;
        }
        let value = self.inner.attributes(user);
        self.users.lock().insert(
            key,
            Timed {
                at: Instant::now(),
                value: value.clone(),
            },
        );
        value
    }

    fn users(&self) -> Vec<String> {
        self.inner.users()
    }
}
