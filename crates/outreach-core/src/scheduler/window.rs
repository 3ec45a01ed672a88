//! Sliding window of unit start times.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Allows at most `cap` starts within any rolling `interval`.
#[derive(Debug)]
pub struct StartWindow {
    cap: usize,
    interval: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl StartWindow {
    pub fn new(cap: usize, interval: Duration) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            interval,
            starts: Mutex::new(VecDeque::with_capacity(cap)),
        }
    }

    /// Wait until a start is allowed, then record it.
    ///
    /// The lock is held across the sleep so waiters are served in order.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }
        let mut starts = self.starts.lock().await;
        loop {
            let now = Instant::now();
            while starts
                .front()
                .is_some_and(|&t| now.duration_since(t) >= self.interval)
            {
                starts.pop_front();
            }
            if starts.len() < self.cap {
                starts.push_back(now);
                return;
            }
            // Full: the oldest start leaves the window first.
            if let Some(&oldest) = starts.front() {
                tokio::time::sleep_until(oldest + self.interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn starts_beyond_cap_wait_for_window() {
        let window = StartWindow::new(2, Duration::from_secs(1));
        let t0 = Instant::now();
        window.acquire().await;
        window.acquire().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);

        window.acquire().await;
        assert_eq!(t0.elapsed(), Duration::from_secs(1));
        window.acquire().await;
        assert_eq!(t0.elapsed(), Duration::from_secs(1));
        window.acquire().await;
        assert_eq!(t0.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_never_waits() {
        let window = StartWindow::new(1, Duration::ZERO);
        let t0 = Instant::now();
        for _ in 0..10 {
            window.acquire().await;
        }
        assert_eq!(t0.elapsed(), Duration::ZERO);
    }
}
