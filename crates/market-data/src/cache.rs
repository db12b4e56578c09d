use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// In-memory map whose entries expire `ttl` after insertion.
///
/// An expired entry is never returned; it is evicted on the next lookup.
pub struct TtlCache<V> {
    entries: DashMap<String, (Instant, V)>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.0.elapsed() < self.ttl => return Some(entry.1.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Insert or overwrite; the entry's clock restarts.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), (Instant::now(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_ttl() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.insert("518880", vec![1.0, 2.0]);

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get("518880"), Some(vec![1.0, 2.0]));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("518880"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_restarts_clock() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.insert("a", 1);
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.insert("a", 2);
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("a"), Some(2));
    }
}
