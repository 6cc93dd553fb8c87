use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Enforces a minimum spacing between requests.
///
/// One pacer is shared by every traversal branch, so concurrent per-ID
/// lookups still reach the remote at most once per `interval`.
pub struct RequestPacer {
    interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until a request may be issued, then claim the slot.
    pub async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }
        // Held across the sleep so waiters queue in order.
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let pacer = RequestPacer::new(Duration::from_millis(200));
        let start = Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_sequential_requests_are_spaced() {
        let pacer = RequestPacer::new(Duration::from_millis(30));
        let start = Instant::now();
        for _ in 0..3 {
            pacer.wait().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_shared_across_tasks() {
        let pacer = Arc::new(RequestPacer::new(Duration::from_millis(30)));
        let start = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pacer = pacer.clone();
                tokio::spawn(async move { pacer.wait().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_zero_interval_never_waits() {
        let pacer = RequestPacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..100 {
            pacer.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
