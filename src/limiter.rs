//! Caps how many requests are in flight at once.
//!
//! Every request must hold an [`InFlightPermit`] while it is outstanding. The permit is
//! returned when it is dropped, so capacity comes back on every exit path, including
//! a panicking task.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A counting permit pool that also tracks the current and peak number of permits
/// held. Clones share the same pool.
#[derive(Clone, Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Proof that a request may be in flight. Dropping it frees the slot.
#[derive(Debug)]
pub struct InFlightPermit {
    // `drop` decrements the in-flight count before the fields, and so the semaphore
    // permit, are dropped.
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        ConcurrencyLimiter {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait until a slot is free and take it.
    pub async fn acquire(&self) -> Result<InFlightPermit, tokio::sync::AcquireError> {
        let permit = self.semaphore.clone().acquire_owned().await?;
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(in_flight, Ordering::SeqCst);
        trace!("{} of {} permits in use", in_flight, self.capacity);

        Ok(InFlightPermit {
            _permit: permit,
            in_flight: self.in_flight.clone(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of permits ever held at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Number of slots free right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn permits_are_returned() {
        let limiter = ConcurrencyLimiter::new(2);
        assert_eq!(limiter.available(), 2);

        let first = limiter.acquire().await.unwrap();
        let second = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available(), 0);
        assert_eq!(limiter.in_flight(), 2);

        drop(first);
        assert_eq!(limiter.available(), 1);
        assert_eq!(limiter.in_flight(), 1);

        drop(second);
        assert_eq!(limiter.available(), 2);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.peak_in_flight(), 2);
    }

    #[tokio::test]
    async fn third_waits_for_a_free_slot() {
        let limiter = ConcurrencyLimiter::new(2);
        let _first = limiter.acquire().await.unwrap();
        let second = limiter.acquire().await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(waiting.is_err(), "third permit granted beyond capacity");

        drop(second);
        let third = tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(third.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn peak_never_exceeds_capacity() {
        let limiter = ConcurrencyLimiter::new(3);
        let mut handles = Vec::new();
        for _ in 0..30 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await.unwrap();
                assert!(limiter.in_flight() <= limiter.capacity());
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(limiter.peak_in_flight() <= 3);
        assert!(limiter.peak_in_flight() >= 1);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.available(), 3);
    }

    #[tokio::test]
    async fn permit_released_when_task_panics() {
        let limiter = ConcurrencyLimiter::new(1);
        let task_limiter = limiter.clone();
        let handle = tokio::spawn(async move {
            let _permit = task_limiter.acquire().await.unwrap();
            panic!("request task failed");
        });
        assert!(handle.await.is_err());
        assert_eq!(limiter.available(), 1);
        assert_eq!(limiter.in_flight(), 0);
    }
}
