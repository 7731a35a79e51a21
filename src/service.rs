use tokio::task::JoinHandle;

use crate::cache::{Eviction, ScheduleCache};
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::models::ScheduleDay;

#[allow(async_fn_in_trait)]
pub trait ScheduleSource {
    async fn fetch_schedule(&self, group_name: &str) -> Result<Vec<ScheduleDay>, ApiError>;
}

impl ScheduleSource for ApiClient {
    async fn fetch_schedule(&self, group_name: &str) -> Result<Vec<ScheduleDay>, ApiError> {
        self.schedule(group_name).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Network,
    Failed,
}

#[derive(Debug)]
pub struct Loaded {
    pub days: Vec<ScheduleDay>,
    pub origin: Origin,
    pub eviction: Option<Eviction>,
    pub eviction_task: Option<JoinHandle<()>>,
}

impl Loaded {
    fn failed() -> Self {
        Self {
            days: Vec::new(),
            origin: Origin::Failed,
            eviction: None,
            eviction_task: None,
        }
    }
}

pub struct ScheduleService<'a, S> {
    source: &'a S,
    cache: &'a ScheduleCache,
}

impl<'a, S: ScheduleSource> ScheduleService<'a, S> {
    pub fn new(source: &'a S, cache: &'a ScheduleCache) -> Self {
        Self { source, cache }
    }

    /// Serves a fresh cache when there is one, otherwise fetches. A failed
    /// fetch is logged and yields no days; nothing is retried.
    pub async fn load(&self, group_name: &str, now_ms: i64) -> Loaded {
        if let Some(days) = self.cache.read(now_ms).await {
            tracing::debug!(days = days.len(), "serving schedule from cache");
            return Loaded {
                days,
                origin: Origin::Cache,
                eviction: None,
                eviction_task: None,
            };
        }

        let counter = self.cache.update_counter(now_ms).await;

        let days = match self.source.fetch_schedule(group_name).await {
            Ok(days) => days,
            Err(e) => {
                tracing::error!(group = group_name, "error fetching schedule: {e:#}");
                return Loaded::failed();
            }
        };

        self.cache.write(&days, now_ms).await;

        let eviction = counter.and_then(|counter| self.cache.eviction_for(&counter, now_ms));
        let eviction_task = eviction.map(|eviction| {
            tracing::warn!(
                due_at_ms = eviction.due_at_ms,
                "schedule request limit reached, cache will be evicted"
            );
            self.cache.spawn_eviction(eviction, now_ms)
        });

        Loaded {
            days,
            origin: Origin::Network,
            eviction,
            eviction_task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::RequestCounter;
    use crate::reconcile::tests::day;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const T0: i64 = 1_731_300_000_000;

    struct FakeSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeSource {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl ScheduleSource for FakeSource {
        async fn fetch_schedule(&self, _group_name: &str) -> Result<Vec<ScheduleDay>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApiError::Status {
                    url: "http://api.test".to_string(),
                    status: reqwest::StatusCode::BAD_GATEWAY,
                    body: String::new(),
                });
            }
            Ok(vec![
                day("2024-11-11", 11, Vec::new()),
                day("2024-11-18", 12, Vec::new()),
            ])
        }
    }

    async fn cache() -> ScheduleCache {
        ScheduleCache::new(db::memory_pool().await, Duration::from_millis(20_000), 4)
    }

    #[tokio::test]
    async fn second_load_within_ttl_is_served_from_cache() {
        let cache = cache().await;
        let source = FakeSource::new(false);
        let service = ScheduleService::new(&source, &cache);

        let first = service.load("G-1", T0).await;
        let second = service.load("G-1", T0 + 1_000).await;

        assert_eq!(first.origin, Origin::Network);
        assert_eq!(second.origin, Origin::Cache);
        assert_eq!(second.days, first.days);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_cache_triggers_refetch_and_counts_it() {
        let cache = cache().await;
        let source = FakeSource::new(false);
        let service = ScheduleService::new(&source, &cache);

        service.load("G-1", T0).await;
        let again = service.load("G-1", T0 + 20_000).await;

        assert_eq!(again.origin, Origin::Network);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            cache.get_counter(T0 + 20_000).await,
            RequestCounter { count: 2, timestamp: T0 }
        );
    }

    #[tokio::test]
    async fn failed_fetch_yields_nothing_and_keeps_cache_empty() {
        let cache = cache().await;
        let source = FakeSource::new(true);
        let service = ScheduleService::new(&source, &cache);

        let loaded = service.load("G-1", T0).await;

        assert_eq!(loaded.origin, Origin::Failed);
        assert!(loaded.days.is_empty());
        assert_eq!(cache.read(T0).await, None);
        assert_eq!(cache.get_counter(T0).await.count, 1);
    }

    #[tokio::test]
    async fn fourth_fetch_in_window_schedules_eviction() {
        let cache = cache().await;
        cache
            .reset_counter(RequestCounter { count: 3, timestamp: T0 }, T0)
            .await;
        let source = FakeSource::new(false);
        let service = ScheduleService::new(&source, &cache);
        let now = T0 + 5_000;

        let loaded = service.load("G-1", now).await;
        if let Some(task) = &loaded.eviction_task {
            task.abort();
        }

        let eviction = loaded.eviction.expect("eviction scheduled");
        assert_eq!(eviction.due_at_ms, T0 + 25_000);
        assert_eq!(eviction.counter_reset, RequestCounter { count: 0, timestamp: now });
        assert_eq!(loaded.days.len(), 2);
        assert!(cache.read(now).await.is_some());

        cache.apply_eviction(eviction).await;
        assert_eq!(cache.read(now).await, None);
        assert_eq!(
            cache.get_counter(now).await,
            RequestCounter { count: 0, timestamp: now }
        );
    }

    #[tokio::test]
    async fn below_limit_schedules_nothing() {
        let cache = cache().await;
        let source = FakeSource::new(false);
        let service = ScheduleService::new(&source, &cache);

        let loaded = service.load("G-1", T0).await;
        assert!(loaded.eviction.is_none());
        assert!(loaded.eviction_task.is_none());
    }
}
