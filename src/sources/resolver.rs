use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::{Resolution, StreamResolver};
use crate::error::PlaybackError;

/// Runs resolutions off the engine task with a bounded number of workers and
/// a hard ceiling per request.
///
/// The ceiling covers the wait for a worker too, so a saturated pool cannot
/// hold an item past its deadline.
pub struct ResolverPool {
    inner: Arc<dyn StreamResolver>,
    permits: Arc<Semaphore>,
    ceiling: Duration,
}

impl ResolverPool {
    pub fn new(inner: Arc<dyn StreamResolver>, workers: usize, ceiling: Duration) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            ceiling,
        }
    }

    async fn run(&self, reference: &str, is_search: bool) -> Result<Resolution, PlaybackError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PlaybackError::Extraction("resolver pool closed".to_string()))?;
        self.inner.resolve(reference, is_search).await
    }
}

#[async_trait]
impl StreamResolver for ResolverPool {
    async fn resolve(&self, reference: &str, is_search: bool) -> Result<Resolution, PlaybackError> {
        debug!(
            "⏳ Resolviendo {} ({} workers libres)",
            reference,
            self.permits.available_permits()
        );

        match tokio::time::timeout(self.ceiling, self.run(reference, is_search)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("⏰ Timeout resolviendo {} tras {:?}", reference, self.ceiling);
                Err(PlaybackError::Timeout(self.ceiling.as_secs()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::ResolvedStream;
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    struct SlowResolver {
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowResolver {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StreamResolver for SlowResolver {
        async fn resolve(&self, reference: &str, _is_search: bool) -> Result<Resolution, PlaybackError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            Ok(Resolution::Stream(ResolvedStream {
                stream_url: format!("https://cdn.example/{}", reference),
                title: reference.to_string(),
                source_url: reference.to_string(),
                transport_headers: HashMap::new(),
            }))
        }
    }

    #[tokio::test]
    async fn test_passes_through_fast_resolution() {
        let pool = ResolverPool::new(
            Arc::new(SlowResolver::new(Duration::from_millis(1))),
            2,
            Duration::from_secs(5),
        );
        let resolution = pool.resolve("song", false).await.unwrap();
        assert_eq!(resolution.stream().stream_url, "https://cdn.example/song");
    }

    #[tokio::test]
    async fn test_slow_resolution_times_out() {
        let pool = ResolverPool::new(
            Arc::new(SlowResolver::new(Duration::from_secs(10))),
            1,
            Duration::from_millis(50),
        );
        assert!(matches!(
            pool.resolve("slow", true).await,
            Err(PlaybackError::Timeout(0))
        ));
    }

    #[tokio::test]
    async fn test_worker_limit_is_respected() {
        let inner = Arc::new(SlowResolver::new(Duration::from_millis(20)));
        let pool = Arc::new(ResolverPool::new(inner.clone(), 2, Duration::from_secs(5)));

        let tasks: Vec<_> = (0..6)
            .map(|i| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.resolve(&format!("song{}", i), false).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert!(inner.peak.load(Ordering::SeqCst) <= 2);
    }
}
