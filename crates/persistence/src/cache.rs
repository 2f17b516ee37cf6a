//! Generic thread-safe TTL cache with LRU-by-last-update eviction.
//!
//! Backs both the market data cache (tickers/klines) and the API
//! request manager's response cache. A read past `expires_at` is a
//! miss; the cache never returns an entry past expiry (invariant #3).

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn expires_at(&self) -> Instant {
        self.inserted_at + self.ttl
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }
}

/// Thread-safe cache bounded by `max_entries`, evicting least-recently
/// updated entries once at capacity.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    default_ttl: Duration,
    max_entries: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn with_capacity(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            max_entries,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;
        if entry.is_expired(now) {
            None
        } else {
            Some(entry.value.clone())
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    /// Inserts `key`, evicting the least-recently-updated entry if the
    /// cache is at capacity. Returns the evicted key, if any, so a
    /// caller tracking side state per key (a streaming subscription, a
    /// file handle) can tear it down.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) -> Option<K> {
        let Ok(mut entries) = self.entries.write() else {
            return None;
        };

        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let now = Instant::now();
            entries.retain(|_, e| !e.is_expired(now));
        }

        let mut evicted = None;
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
                evicted = Some(oldest);
            }
        }

        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        evicted
    }

    /// Remove a key, returning whether it was present and evicting any
    /// caller-owned side state (streaming subscriptions, etc) is the
    /// caller's responsibility.
    pub fn invalidate(&self, key: &K) -> bool {
        self.entries
            .write()
            .map(|mut e| e.remove(key).is_some())
            .unwrap_or(false)
    }

    pub fn cleanup(&self) {
        let now = Instant::now();
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, e| !e.is_expired(now));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<K> {
        self.entries
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_after_set_returns_same_value_until_ttl() {
        let cache: TtlCache<String, i32> = TtlCache::with_capacity(Duration::from_secs(60), 10);
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache: TtlCache<String, i32> = TtlCache::with_capacity(Duration::from_millis(1), 10);
        cache.insert("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn evicts_oldest_when_at_capacity() {
        let cache: TtlCache<String, i32> = TtlCache::with_capacity(Duration::from_secs(60), 2);
        cache.insert("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b".to_string(), 2);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c".to_string(), 3);
        assert_eq!(cache.get(&"a".to_string()), None);
        assert!(cache.get(&"b".to_string()).is_some() || cache.get(&"c".to_string()).is_some());
    }
}
