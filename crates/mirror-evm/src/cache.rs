//! # Read-Through Caches
//!
//! Size- and time-bounded caches for snapshot lookups. Values may be
//! evicted or go stale at any time; callers re-query through the loader.
//!
//! ## Policy
//!
//! - Capacity is enforced with LRU eviction
//! - Expiry is measured from the last write or the last access
//! - Loader errors are returned and never cached

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// Get-or-load capability.
pub trait Cache<K, V> {
    /// Cached value for `key`, or the loader's value, which is then cached.
    ///
    /// # Errors
    ///
    /// Whatever the loader returns. Nothing is cached on error.
    fn get_or_load<E, F>(&self, key: K, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>;

    /// Drops one entry.
    fn invalidate(&self, key: &K);

    /// Number of live or expired-but-unswept entries.
    fn len(&self) -> usize;

    /// True when nothing is cached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// When an entry stops being served.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expiry {
    /// Entries live until evicted.
    Never,
    /// Entries expire a fixed time after they were loaded.
    AfterWrite(Duration),
    /// Entries expire a fixed time after they were last read.
    AfterAccess(Duration),
}

/// Size and expiry of one cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Maximum entries.
    pub max_size: usize,
    /// Expiry rule.
    pub expiry: Expiry,
}

impl CachePolicy {
    /// Policy with write-based expiry.
    #[must_use]
    pub const fn after_write(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size,
            expiry: Expiry::AfterWrite(ttl),
        }
    }

    /// Policy with access-based expiry.
    #[must_use]
    pub const fn after_access(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size,
            expiry: Expiry::AfterAccess(ttl),
        }
    }

    /// Policy without expiry.
    #[must_use]
    pub const fn unbounded_time(max_size: usize) -> Self {
        Self {
            max_size,
            expiry: Expiry::Never,
        }
    }
}

struct Entry<V> {
    value: V,
    stamp: Instant,
}

/// LRU cache with an expiry policy.
pub struct TtlCache<K: Hash + Eq, V> {
    inner: Mutex<LruCache<K, Entry<V>>>,
    expiry: Expiry,
}

impl<K: Hash + Eq + Clone, V: Clone> TtlCache<K, V> {
    /// Creates a cache. A zero size is treated as one.
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        let capacity = NonZeroUsize::new(policy.max_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            expiry: policy.expiry,
        }
    }

    /// Maximum entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }

    fn is_expired(&self, stamp: Instant, now: Instant) -> bool {
        match self.expiry {
            Expiry::Never => false,
            Expiry::AfterWrite(ttl) | Expiry::AfterAccess(ttl) => now.duration_since(stamp) >= ttl,
        }
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let expired = match inner.get(key) {
            None => return None,
            Some(entry) => self.is_expired(entry.stamp, now),
        };
        if expired {
            inner.pop(key);
            return None;
        }
        let entry = inner.get_mut(key)?;
        if matches!(self.expiry, Expiry::AfterAccess(_)) {
            entry.stamp = now;
        }
        Some(entry.value.clone())
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Cache<K, V> for TtlCache<K, V> {
    fn get_or_load<E, F>(&self, key: K, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }
        // The lock is not held while loading; a concurrent miss loads twice.
        let value = loader()?;
        self.inner.lock().put(
            key,
            Entry {
                value: value.clone(),
                stamp: Instant::now(),
            },
        );
        Ok(value)
    }

    fn invalidate(&self, key: &K) {
        self.inner.lock().pop(key);
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_hit_skips_loader() {
        let cache = TtlCache::new(CachePolicy::unbounded_time(4));
        let calls = Cell::new(0);
        let load = || {
            calls.set(calls.get() + 1);
            Ok::<_, ()>(42)
        };

        assert_eq!(cache.get_or_load("a", load).unwrap(), 42);
        assert_eq!(cache.get_or_load("a", load).unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_loader_error_not_cached() {
        let cache: TtlCache<u8, u8> = TtlCache::new(CachePolicy::unbounded_time(4));
        assert_eq!(cache.get_or_load(1, || Err("down")), Err("down"));
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_load(1, || Ok::<_, &str>(7)), Ok(7));
    }

    #[test]
    fn test_zero_ttl_always_reloads() {
        let cache = TtlCache::new(CachePolicy::after_write(4, Duration::ZERO));
        let calls = Cell::new(0);
        for _ in 0..3 {
            cache
                .get_or_load(1u8, || {
                    calls.set(calls.get() + 1);
                    Ok::<_, ()>(calls.get())
                })
                .unwrap();
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_lru_eviction_and_invalidate() {
        let cache = TtlCache::new(CachePolicy::unbounded_time(2));
        cache.get_or_load(1u8, || Ok::<_, ()>(1)).unwrap();
        cache.get_or_load(2u8, || Ok::<_, ()>(2)).unwrap();
        cache.get_or_load(3u8, || Ok::<_, ()>(3)).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.capacity(), 2);

        cache.invalidate(&3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_or_load(1u8, || Ok::<_, ()>(10)).unwrap(), 10);
    }
}
