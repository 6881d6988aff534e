// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Spacing of outbound calls to the sink.
//!
//! Calls run one at a time, in the order they were submitted, and each call
//! starts at least `interval` after the previous one started.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    // tokio's Mutex hands out the lock in FIFO order
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for this call's turn, then runs it to completion.
    pub async fn run<F, T>(&self, call: F) -> T
    where
        F: Future<Output = T>,
    {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            sleep_until(previous + self.interval).await;
        }
        *last_call = Some(Instant::now());
        call.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex as TokioMutex;

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced_by_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        let start = Instant::now();

        let mut starts = Vec::new();
        for _ in 0..3 {
            limiter.run(async { starts.push(Instant::now()) }).await;
        }

        assert_eq!(starts[0] - start, Duration::ZERO);
        assert_eq!(starts[1] - starts[0], Duration::from_millis(200));
        assert_eq!(starts[2] - starts[1], Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_idle_period() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        limiter.run(async {}).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let before = Instant::now();
        limiter.run(async {}).await;
        assert_eq!(Instant::now() - before, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_keep_submission_order() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(50)));
        let order = Arc::new(TokioMutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let limiter = Arc::clone(&limiter);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                limiter.run(async { order.lock().await.push(i) }).await;
            }));
            // let each task queue on the limiter before spawning the next
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_call_in_flight() {
        let limiter = Arc::new(RateLimiter::new(Duration::ZERO));
        let in_flight = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let max_seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                limiter
                    .run(async {
                        use std::sync::atomic::Ordering;
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_seen.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
