//! Read-through cache for bulk reads that change rarely (the knowledge base).

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Entry<T> {
    value: T,
    loaded_at: Instant,
}

/// Single-slot cache that expires `ttl` after it was populated.
///
/// The slot lock is held while the loader runs, so concurrent callers on a cold cache wait for one
/// load instead of issuing their own.
pub struct TtlCache<T> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slot: Mutex<Option<Entry<T>>>,
}

impl<T> std::fmt::Debug for TtlCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value, or the result of `loader` when the slot is empty or stale.
    ///
    /// A loader error is returned as is and leaves the slot empty.
    pub async fn get_or_try_populate<F, Fut, E>(&self, loader: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;
        let now = self.clock.now();
        if let Some(entry) = slot.as_ref() {
            if now.saturating_duration_since(entry.loaded_at) < self.ttl {
                return Ok(entry.value.clone());
            }
            log::debug!("cache entry expired after {:?}", self.ttl);
        }

        *slot = None;
        let value = loader().await?;
        *slot = Some(Entry {
            value: value.clone(),
            loaded_at: self.clock.now(),
        });
        Ok(value)
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }

    pub async fn is_populated(&self) -> bool {
        let slot = self.slot.lock().await;
        let now = self.clock.now();
        slot.as_ref()
            .is_some_and(|entry| now.saturating_duration_since(entry.loaded_at) < self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ManualClock {
        now: std::sync::Mutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: std::sync::Mutex::new(Instant::now()),
            })
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    async fn load(calls: &AtomicUsize) -> Result<usize, String> {
        Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[tokio::test]
    async fn serves_cached_value_until_expiry() {
        let clock = ManualClock::new();
        let cache = TtlCache::with_clock(Duration::from_secs(3_600), clock.clone());
        let calls = AtomicUsize::new(0);

        assert_eq!(cache.get_or_try_populate(|| load(&calls)).await, Ok(1));
        clock.advance(Duration::from_secs(3_599));
        assert_eq!(cache.get_or_try_populate(|| load(&calls)).await, Ok(1));
        assert!(cache.is_populated().await);

        clock.advance(Duration::from_secs(1));
        assert!(!cache.is_populated().await);
        assert_eq!(cache.get_or_try_populate(|| load(&calls)).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn loader_error_leaves_slot_empty() {
        let clock = ManualClock::new();
        let cache: TtlCache<usize> = TtlCache::with_clock(Duration::from_secs(60), clock);

        let err = cache
            .get_or_try_populate(|| async { Err::<usize, _>("upstream down".to_string()) })
            .await;
        assert_eq!(err, Err("upstream down".to_string()));
        assert!(!cache.is_populated().await);

        let calls = AtomicUsize::new(0);
        assert_eq!(cache.get_or_try_populate(|| load(&calls)).await, Ok(1));
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        assert_eq!(cache.get_or_try_populate(|| load(&calls)).await, Ok(1));
        cache.invalidate().await;
        assert_eq!(cache.get_or_try_populate(|| load(&calls)).await, Ok(2));
    }

    #[tokio::test]
    async fn concurrent_cold_reads_load_once() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_populate(|| async {
                        tokio::task::yield_now().await;
                        load(&calls).await
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(1));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
