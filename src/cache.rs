//! Short-lived schedule cache and the request counter that guards it.
//!
//! Both live in the local key-value store. Neither ever surfaces a storage
//! error to the caller: failures are logged and read as a miss.

use std::time::Duration;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;

use crate::db;
use crate::models::{
    CachedSchedule, RequestCounter, ScheduleDay, REQUEST_COUNTER_KEY, SCHEDULE_CACHE_KEY,
};

/// Removal of the cache plus counter reset, due at `due_at_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eviction {
    pub due_at_ms: i64,
    pub counter_reset: RequestCounter,
}

#[derive(Clone)]
pub struct ScheduleCache {
    pool: SqlitePool,
    ttl_ms: i64,
    request_limit: u32,
}

impl ScheduleCache {
    pub fn new(pool: SqlitePool, ttl: Duration, request_limit: u32) -> Self {
        Self {
            pool,
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            request_limit,
        }
    }

    pub async fn read(&self, now_ms: i64) -> Option<Vec<ScheduleDay>> {
        let raw = match db::get_item(&self.pool, SCHEDULE_CACHE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!("error reading schedule cache: {e:#}");
                return None;
            }
        };

        let cached: CachedSchedule = match serde_json::from_str(&raw) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::error!("error decoding schedule cache: {e}");
                return None;
            }
        };

        if now_ms - cached.timestamp < self.ttl_ms {
            Some(cached.data)
        } else {
            tracing::debug!(age_ms = now_ms - cached.timestamp, "schedule cache stale");
            None
        }
    }

    pub async fn write(&self, data: &[ScheduleDay], now_ms: i64) {
        let cached = CachedSchedule {
            timestamp: now_ms,
            data: data.to_vec(),
        };
        let result = match serde_json::to_string(&cached) {
            Ok(raw) => db::set_item(&self.pool, SCHEDULE_CACHE_KEY, &raw, now_ms).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::error!("error setting schedule cache: {e:#}");
        }
    }

    pub async fn remove(&self) {
        if let Err(e) = db::remove_item(&self.pool, SCHEDULE_CACHE_KEY).await {
            tracing::error!("error removing schedule cache: {e:#}");
        }
    }

    /// Persisted counter, or a fresh one once its window has elapsed.
    /// The reset is not written back here.
    pub async fn get_counter(&self, now_ms: i64) -> RequestCounter {
        let stored = match db::get_item(&self.pool, REQUEST_COUNTER_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<RequestCounter>(&raw) {
                Ok(counter) => Some(counter),
                Err(e) => {
                    tracing::warn!("error decoding request counter: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("error reading request counter: {e:#}");
                None
            }
        };

        match stored {
            Some(counter) if now_ms - counter.timestamp <= self.ttl_ms => counter,
            _ => RequestCounter::fresh(now_ms),
        }
    }

    pub async fn update_counter(&self, now_ms: i64) -> Option<RequestCounter> {
        let current = self.get_counter(now_ms).await;
        let next = RequestCounter {
            count: current.count.saturating_add(1),
            timestamp: current.timestamp,
        };

        match self.store_counter(next, now_ms).await {
            Ok(()) => Some(next),
            Err(e) => {
                tracing::error!("error updating request counter: {e:#}");
                None
            }
        }
    }

    pub async fn reset_counter(&self, counter: RequestCounter, now_ms: i64) {
        if let Err(e) = self.store_counter(counter, now_ms).await {
            tracing::error!("error resetting request counter: {e:#}");
        }
    }

    async fn store_counter(&self, counter: RequestCounter, now_ms: i64) -> anyhow::Result<()> {
        let raw = serde_json::to_string(&counter)?;
        db::set_item(&self.pool, REQUEST_COUNTER_KEY, &raw, now_ms).await
    }

    /// The eviction owed after a fetch counted as `counter`, if the client
    /// has hit the request limit in this window.
    pub fn eviction_for(&self, counter: &RequestCounter, now_ms: i64) -> Option<Eviction> {
        if counter.count < self.request_limit {
            return None;
        }
        Some(Eviction {
            due_at_ms: now_ms + self.ttl_ms,
            counter_reset: RequestCounter::fresh(now_ms),
        })
    }

    pub async fn apply_eviction(&self, eviction: Eviction) {
        tracing::debug!(due_at_ms = eviction.due_at_ms, "evicting schedule cache");
        self.remove().await;
        self.reset_counter(eviction.counter_reset, eviction.due_at_ms)
            .await;
    }

    /// Runs `eviction` once it is due. Dropping the handle does not cancel it.
    pub fn spawn_eviction(&self, eviction: Eviction, now_ms: i64) -> JoinHandle<()> {
        let cache = self.clone();
        let delay = u64::try_from(eviction.due_at_ms - now_ms).unwrap_or(0);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            cache.apply_eviction(eviction).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DayInfo;
    use chrono::NaiveDate;

    const T0: i64 = 1_731_300_000_000;

    fn sample_days() -> Vec<ScheduleDay> {
        vec![ScheduleDay {
            info: DayInfo {
                day_type: 0,
                week_number: 11,
                date: NaiveDate::from_ymd_opt(2024, 11, 11).unwrap(),
            },
            lessons: Vec::new(),
        }]
    }

    async fn cache() -> ScheduleCache {
        ScheduleCache::new(db::memory_pool().await, Duration::from_millis(20_000), 4)
    }

    #[tokio::test]
    async fn read_returns_written_data_within_ttl() {
        let cache = cache().await;
        cache.write(&sample_days(), T0).await;

        assert_eq!(cache.read(T0 + 19_999).await, Some(sample_days()));
        assert_eq!(cache.read(T0 + 20_000).await, None);
    }

    #[tokio::test]
    async fn latest_write_wins() {
        let cache = cache().await;
        cache.write(&sample_days(), T0).await;
        cache.write(&[], T0 + 10).await;

        assert_eq!(cache.read(T0 + 20).await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn corrupt_cache_reads_as_miss() {
        let cache = cache().await;
        db::set_item(&cache.pool, SCHEDULE_CACHE_KEY, "{not json", T0)
            .await
            .unwrap();

        assert_eq!(cache.read(T0).await, None);
    }

    #[tokio::test]
    async fn counter_increments_within_window() {
        let cache = cache().await;
        let first = cache.update_counter(T0).await.unwrap();
        let second = cache.update_counter(T0 + 5_000).await.unwrap();

        assert_eq!(first, RequestCounter { count: 1, timestamp: T0 });
        assert_eq!(second, RequestCounter { count: 2, timestamp: T0 });
    }

    #[tokio::test]
    async fn counter_resets_lazily_after_window() {
        let cache = cache().await;
        cache.update_counter(T0).await.unwrap();
        cache.update_counter(T0).await.unwrap();

        let later = T0 + 20_001;
        assert_eq!(cache.get_counter(later).await, RequestCounter::fresh(later));
        assert_eq!(
            cache.update_counter(later).await,
            Some(RequestCounter { count: 1, timestamp: later })
        );
    }

    #[tokio::test]
    async fn eviction_only_at_request_limit() {
        let cache = cache().await;
        let below = RequestCounter { count: 3, timestamp: T0 };
        let at = RequestCounter { count: 4, timestamp: T0 };

        assert_eq!(cache.eviction_for(&below, T0 + 5_000), None);
        assert_eq!(
            cache.eviction_for(&at, T0 + 5_000),
            Some(Eviction {
                due_at_ms: T0 + 25_000,
                counter_reset: RequestCounter::fresh(T0 + 5_000),
            })
        );
    }

    #[tokio::test]
    async fn spawned_eviction_clears_cache_and_counter() {
        let cache = cache().await;
        cache.write(&sample_days(), T0).await;
        for _ in 0..4 {
            cache.update_counter(T0).await;
        }
        let eviction = Eviction {
            due_at_ms: T0 + 50,
            counter_reset: RequestCounter::fresh(T0),
        };

        cache.spawn_eviction(eviction, T0).await.unwrap();

        assert_eq!(cache.read(T0 + 1).await, None);
        assert_eq!(
            cache.get_counter(T0 + 1).await,
            RequestCounter { count: 0, timestamp: T0 }
        );
    }
}
