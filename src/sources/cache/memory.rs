use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::CacheService;
use crate::BoxError;

/// In-process cache. Expired entries are dropped when next read.
#[derive(Debug, Default)]
pub struct MemoryCache {
    /// `None` expiry never expires.
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((_, Some(expires))) if *expires <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((data, _)) => Ok(Some(data.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, data: String, ttl: Duration) -> Result<bool, BoxError> {
        if ttl.is_zero() {
            return Ok(false);
        }
        let expires = Instant::now().checked_add(ttl);
        self.entries.lock().insert(key.to_string(), (data, expires));
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<bool, BoxError> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_del() {
        let cache = MemoryCache::new();
        assert!(cache.set("k", "v".into(), Duration::from_secs(60)).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
        assert!(cache.del("k").await.unwrap());
        assert!(!cache.del("k").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_stores_nothing() {
        let cache = MemoryCache::new();
        assert!(!cache.set("k", "v".into(), Duration::ZERO).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache.set("k", "v".into(), Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.entries.lock().is_empty());
    }
}
