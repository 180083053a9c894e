//! Single-slot, time-bounded cache of the aggregated news list.
//!
//! The entry lives in two storage keys: the serialized item list and the
//! epoch-millisecond timestamp it was cached at. Any failure to read or parse
//! either key is treated as an absent cache.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::db::Storage;
use crate::news::NewsItem;

pub const CACHE_KEY: &str = "ai_news_cache";
pub const CACHE_TIME_KEY: &str = "ai_news_cache_time";

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub items: Vec<NewsItem>,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.cached_at < ttl
    }
}

pub struct NewsCache {
    storage: Arc<dyn Storage>,
    ttl: Duration,
}

impl NewsCache {
    pub fn new(storage: Arc<dyn Storage>, ttl: Duration) -> Self {
        Self { storage, ttl }
    }

    pub fn with_ttl(self, ttl: Duration) -> Self {
        Self { ttl, ..self }
    }

    /// Returns the cached entry if one exists and is younger than the TTL.
    pub async fn load(&self, now: DateTime<Utc>) -> Option<CacheEntry> {
        let entry = match self.read().await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!("Error reading news cache: {}", e);
                return None;
            }
        };

        if entry.is_fresh(now, self.ttl) {
            debug!("News cache hit ({} items)", entry.items.len());
            Some(entry)
        } else {
            debug!("News cache expired (cached at {})", entry.cached_at);
            None
        }
    }

    async fn read(&self) -> anyhow::Result<Option<CacheEntry>> {
        let cached_time = self.storage.get(CACHE_TIME_KEY).await?;
        let cached_data = self.storage.get(CACHE_KEY).await?;

        let (Some(cached_time), Some(cached_data)) = (cached_time, cached_data) else {
            return Ok(None);
        };

        let millis: i64 = cached_time.trim().parse()?;
        let cached_at = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| anyhow::anyhow!("cache timestamp out of range: {}", millis))?;
        let items: Vec<NewsItem> = serde_json::from_str(&cached_data)?;

        Ok(Some(CacheEntry { items, cached_at }))
    }

    /// Replaces the cached entry. Failures are logged and otherwise ignored.
    pub async fn store(&self, entry: &CacheEntry) {
        let data = match serde_json::to_string(&entry.items) {
            Ok(data) => data,
            Err(e) => {
                warn!("Error serializing news cache: {}", e);
                return;
            }
        };
        let time = entry.cached_at.timestamp_millis().to_string();

        // Drop the timestamp first so a partially written entry never reads as fresh
        let result = async {
            self.storage.remove(CACHE_TIME_KEY).await?;
            self.storage.set(CACHE_KEY, &data).await?;
            self.storage.set(CACHE_TIME_KEY, &time).await
        }
        .await;

        if let Err(e) = result {
            warn!("Error saving news cache: {}", e);
        }
    }

    pub async fn clear(&self) {
        for key in [CACHE_KEY, CACHE_TIME_KEY] {
            if let Err(e) = self.storage.remove(key).await {
                warn!("Error clearing news cache key '{}': {}", key, e);
            }
        }
    }
}
