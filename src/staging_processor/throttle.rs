//! Sliding-window rate limiter for file operations, modeled on the
//! download manager's `SlidingWindowThrottler`: callers await a permit
//! before each move/copy, and the throttler caps how many permits are
//! handed out inside any trailing one-second window.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;

pub struct FileOpThrottler {
    max_ops_per_second: usize,
    window: Mutex<VecDeque<Instant>>,
}

impl FileOpThrottler {
    pub fn new(max_ops_per_second: usize) -> Self {
        Self {
            max_ops_per_second,
            window: Mutex::new(VecDeque::new()),
        }
    }

    /// Unlimited throttler, for dry runs and tests.
    pub fn unlimited() -> Self {
        Self::new(usize::MAX)
    }

    /// Blocks until a permit is available under the current window, then
    /// records the permit as spent.
    pub async fn acquire(&self) {
        if self.max_ops_per_second == usize::MAX {
            return;
        }
        loop {
            let wait = {
                let mut window = self.window.lock().unwrap();
                let now = Instant::now();
                while window.front().is_some_and(|t| now.duration_since(*t) >= Duration::from_secs(1)) {
                    window.pop_front();
                }
                if window.len() < self.max_ops_per_second {
                    window.push_back(now);
                    None
                } else {
                    let oldest = *window.front().unwrap();
                    Some(Duration::from_secs(1) - now.duration_since(oldest))
                }
            };
            match wait {
                None => return,
                Some(d) => sleep(d).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permits_up_to_the_cap_do_not_block() {
        let throttler = FileOpThrottler::new(4);
        let start = Instant::now();
        for _ in 0..4 {
            throttler.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn unlimited_throttler_never_waits() {
        let throttler = FileOpThrottler::unlimited();
        let start = Instant::now();
        for _ in 0..1000 {
            throttler.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }
}
