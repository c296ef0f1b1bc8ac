// src/utils/cache.rs

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::{Serialize, de::DeserializeOwned};

/// Cache key of the dashboard aggregate.
pub const DASHBOARD_STATS_KEY: &str = "stats:dashboard";

const STUDENT_KEY_PREFIX: &str = "student:";

/// Cache key for a student looked up by its natural key.
pub fn student_key(student_id: &str) -> String {
    format!("{}{}", STUDENT_KEY_PREFIX, student_id)
}

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Process-local key/value cache with a per-entry lifetime.
///
/// Values are stored as JSON so that any serializable response can be
/// cached without the cache knowing its type. Expired entries are dropped
/// lazily on read.
#[derive(Default)]
pub struct TtlCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return serde_json::from_value(entry.value.clone()).ok();
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Entry exists but expired.
        self.remove(key);
        None
    }

    pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: &T, ttl: Duration) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Skipping cache insert, value not serializable: {}", e);
                return;
            }
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key).is_some()
    }

    /// Drops every student lookup entry.
    pub fn invalidate_students(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|key, _| !key.starts_with(STUDENT_KEY_PREFIX));
    }

    /// Drops whatever a roster or record write may have made stale.
    pub fn invalidate_after_write(&self) {
        self.invalidate_students();
        self.remove(DASHBOARD_STATS_KEY);
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_before_expiry() {
        let cache = TtlCache::new();
        cache.insert("k", &42_i64, Duration::from_secs(60));
        assert_eq!(cache.get::<i64>("k"), Some(42));
    }

    #[test]
    fn expired_entries_are_evicted_on_read() {
        let cache = TtlCache::new();
        cache.insert("k", &"v", Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get::<String>("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_after_write_keeps_unrelated_keys() {
        let cache = TtlCache::new();
        let ttl = Duration::from_secs(60);
        cache.insert(student_key("S001"), &"a", ttl);
        cache.insert(student_key("S002"), &"b", ttl);
        cache.insert(DASHBOARD_STATS_KEY, &1, ttl);
        cache.insert("other", &2, ttl);

        cache.invalidate_after_write();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get::<i32>("other"), Some(2));
    }
}
