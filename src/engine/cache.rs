//! 複合查詢結果的 TTL 快取。
//!
//! 過期項目在查詢時才移除；沒有容量上限。同一個 key 同時 miss 時
//! 兩邊都會各自計算一次，最後 put 的值留下。

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

pub const DEFAULT_TTL_SECONDS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub inserted_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ResultCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
}

impl<V: Clone> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECONDS)
    }
}

impl<V: Clone> ResultCache<V> {
    pub fn new(ttl_seconds: u64) -> Self {
        let ttl_seconds = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        Self {
            entries: DashMap::new(),
            ttl: Duration::try_seconds(ttl_seconds).unwrap_or(Duration::MAX),
        }
    }

    /// 使用者查詢 + 地區提示組成快取 key
    pub fn normalize_key(query: &str, region: &str) -> String {
        let query = query.trim();
        let region = region.trim();
        if region.is_empty() {
            query.to_string()
        } else {
            format!("{} {}", query, region)
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if now - entry.inserted_at < self.ttl {
                return Some(entry.value.clone());
            }
        }

        // 只移除確實過期的項目，避免刪掉別人剛寫入的新值
        let ttl = self.ttl;
        if self
            .entries
            .remove_if(key, |_, entry| now - entry.inserted_at >= ttl)
            .is_some()
        {
            tracing::debug!("Cache entry expired: {}", key);
        }
        None
    }

    pub fn put(&self, key: impl Into<String>, value: V) {
        self.put_at(key, value, Utc::now());
    }

    pub fn put_at(&self, key: impl Into<String>, value: V, now: DateTime<Utc>) {
        let key = key.into();
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                inserted_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_ttl() {
        let cache = ResultCache::new(3600);
        let t0 = Utc::now();
        cache.put_at("카페 성수동", 42, t0);
        assert_eq!(cache.get_at("카페 성수동", t0 + Duration::seconds(3599)), Some(42));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_lookup() {
        let cache = ResultCache::new(3600);
        let t0 = Utc::now();
        cache.put_at("카페 성수동", 42, t0);
        assert_eq!(cache.get_at("카페 성수동", t0 + Duration::seconds(3600)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_overwrites_with_fresh_timestamp() {
        let cache = ResultCache::new(10);
        let t0 = Utc::now();
        cache.put_at("k", 1, t0);
        cache.put_at("k", 2, t0 + Duration::seconds(8));
        assert_eq!(cache.get_at("k", t0 + Duration::seconds(12)), Some(2));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(ResultCache::<()>::normalize_key(" 하이라인 카페 ", "성수동"), "하이라인 카페 성수동");
        assert_eq!(ResultCache::<()>::normalize_key("하이라인", "  "), "하이라인");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_and_put() {
        let cache = std::sync::Arc::new(ResultCache::<usize>::new(3600));

        let tasks: Vec<_> = (0..16usize)
            .map(|worker| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    for i in 0..100usize {
                        cache.put(format!("카페 {}", worker), i);
                        cache.put("공유 키", worker);
                        let own = cache.get(&format!("카페 {}", worker));
                        assert_eq!(own, Some(i));
                        let shared = cache.get("공유 키");
                        assert!(matches!(shared, Some(w) if w < 16));
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(cache.len(), 17);
        for worker in 0..16usize {
            assert_eq!(cache.get(&format!("카페 {}", worker)), Some(99));
        }
    }
}
