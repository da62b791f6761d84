//! In-process TTL cache for analysis results.
//!
//! Entries share a single TTL and are reaped lazily when a read finds them
//! expired; there is no background sweeper. The cache only saves vendor calls:
//! clearing it never changes what a facade returns.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::domain::analysis::{Categorization, ColdDetection};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Categorization is message-scoped.
    Categorize(String),
    /// Cold-email verdicts are sender-scoped. Holds a normalized address.
    ColdSender(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Categorize(message_id) => write!(f, "categorize:{message_id}"),
            Self::ColdSender(address) => write!(f, "cold:{address}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CachedAnalysis {
    Categorization(Categorization),
    ColdDetection(ColdDetection),
}

#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
}

#[derive(Debug)]
pub struct ResultCache<V = CachedAnalysis> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &CacheKey, now: Instant) -> Option<V> {
        let mut entries = self.lock();
        let name = key.to_string();
        let expired = match entries.get(&name) {
            None => return None,
            Some(entry) => now.saturating_duration_since(entry.created_at) >= self.ttl,
        };

        if expired {
            entries.remove(&name);
            tracing::debug!(event_name = "cache.expired", cache_key = %name, "cache entry expired");
            return None;
        }

        entries.get(&name).map(|entry| entry.value.clone())
    }

    pub fn set(&self, key: &CacheKey, value: V) {
        self.set_at(key, value, Instant::now());
    }

    pub fn set_at(&self, key: &CacheKey, value: V, now: Instant) {
        if self.ttl.is_zero() {
            return;
        }
        self.lock().insert(key.to_string(), CacheEntry { value, created_at: now });
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet reaped.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // Inserts and removals are single map operations; poisoning cannot
        // leave a partial entry behind.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{CacheKey, ResultCache};

    #[test]
    fn keys_render_with_scope_prefix() {
        assert_eq!(CacheKey::Categorize("18c2f".to_string()).to_string(), "categorize:18c2f");
        assert_eq!(CacheKey::ColdSender("a@b.com".to_string()).to_string(), "cold:a@b.com");
    }

    #[test]
    fn value_is_visible_within_ttl() {
        let cache = ResultCache::<u32>::new(Duration::from_secs(60));
        let key = CacheKey::Categorize("m1".to_string());
        let start = Instant::now();

        cache.set_at(&key, 7, start);
        assert_eq!(cache.get_at(&key, start), Some(7));
        assert_eq!(cache.get_at(&key, start + Duration::from_secs(59)), Some(7));
    }

    #[test]
    fn expired_entry_is_reaped_and_not_resurrected() {
        let cache = ResultCache::<u32>::new(Duration::from_secs(60));
        let key = CacheKey::ColdSender("sales@vendor.com".to_string());
        let start = Instant::now();

        cache.set_at(&key, 1, start);
        assert_eq!(cache.get_at(&key, start + Duration::from_secs(60)), None);
        assert_eq!(cache.len(), 0, "expired read should evict the entry");
        assert_eq!(cache.get_at(&key, start), None, "later reads must not resurrect it");
    }

    #[test]
    fn zero_ttl_disables_storage() {
        let cache = ResultCache::<u32>::new(Duration::ZERO);
        let key = CacheKey::Categorize("m1".to_string());

        cache.set(&key, 3);
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn scopes_do_not_collide() {
        let cache = ResultCache::<&str>::new(Duration::from_secs(60));
        cache.set(&CacheKey::Categorize("x".to_string()), "category");
        cache.set(&CacheKey::ColdSender("x".to_string()), "cold");

        assert_eq!(cache.get(&CacheKey::Categorize("x".to_string())), Some("category"));
        assert_eq!(cache.get(&CacheKey::ColdSender("x".to_string())), Some("cold"));

        cache.clear();
        assert!(cache.is_empty());
    }
}
