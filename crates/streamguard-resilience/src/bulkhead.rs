//! Bulkhead bounding concurrent in-flight downstream work.
//!
//! A fixed pool of permits backed by a semaphore. Holding a
//! [`BulkheadPermit`] is holding one of the pool's slots; waiting tasks
//! queue on the semaphore instead of spawning unbounded work.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Bulkhead configuration
#[derive(Debug, Clone)]
pub struct BulkheadConfig {
    /// Maximum concurrently held permits
    pub max_concurrent: usize,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self { max_concurrent: 5 }
    }
}

/// Permit for one pool slot, released on drop
#[derive(Debug)]
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
}

/// Semaphore-gated execution pool
#[derive(Debug)]
pub struct Bulkhead {
    id: String,
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
}

impl Bulkhead {
    /// Create a new bulkhead
    #[must_use]
    pub fn new(id: impl Into<String>, config: BulkheadConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            id: id.into(),
            config,
            semaphore,
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(id: impl Into<String>) -> Self {
        Self::new(id, BulkheadConfig::default())
    }

    /// Get the bulkhead ID
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Hard upper bound on concurrently held permits
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent
    }

    /// Permits not currently held
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Acquire a slot, waiting until one frees up
    pub async fn acquire(&self) -> BulkheadPermit {
        // The semaphore is never closed.
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("bulkhead semaphore closed");
        debug!(
            bulkhead = %self.id,
            available = self.semaphore.available_permits(),
            "slot acquired"
        );
        BulkheadPermit { _permit: permit }
    }

    /// Acquire a slot without waiting
    #[must_use]
    pub fn try_acquire(&self) -> Option<BulkheadPermit> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| BulkheadPermit { _permit: permit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_bounds_peak_concurrency() {
        let bulkhead = Arc::new(Bulkhead::new("test", BulkheadConfig { max_concurrent: 2 }));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let bulkhead = Arc::clone(&bulkhead);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _permit = bulkhead.acquire().await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.expect("task");
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(bulkhead.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_try_acquire_fails_when_exhausted() {
        let bulkhead = Bulkhead::new("test", BulkheadConfig { max_concurrent: 1 });

        let held = bulkhead.try_acquire();
        assert!(held.is_some());
        assert!(bulkhead.try_acquire().is_none());

        drop(held);
        assert!(bulkhead.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let bulkhead = Bulkhead::with_defaults("test");
        assert_eq!(bulkhead.available_permits(), 5);

        {
            let _permit = bulkhead.acquire().await;
            assert_eq!(bulkhead.available_permits(), 4);
        }
        assert_eq!(bulkhead.available_permits(), 5);
    }
}
