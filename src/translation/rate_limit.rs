/*!
 * Sliding-window admission control for request starts.
 *
 * At most `limit` requests may start within any window of `window` length.
 * Waiting callers sleep until the oldest start leaves the window.
 */

use log::debug;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Sliding-window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Admit at most `limit` starts per `window`
    pub fn new(limit: u32, window: Duration) -> Self {
        let limit = limit.max(1) as usize;
        Self {
            limit,
            window,
            starts: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    /// Limiter for a requests-per-window setting, `None` when unlimited
    pub fn per_window(limit: Option<u32>, window: Duration) -> Option<Self> {
        match limit {
            Some(limit) if limit > 0 => Some(Self::new(limit, window)),
            _ => None,
        }
    }

    /// Maximum starts per window
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait for a rate token
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut starts = self.starts.lock().await;
                let now = Instant::now();
                while starts
                    .front()
                    .is_some_and(|start| now.duration_since(*start) >= self.window)
                {
                    starts.pop_front();
                }

                match starts.front() {
                    Some(oldest) if starts.len() >= self.limit => {
                        self.window - now.duration_since(*oldest)
                    }
                    _ => {
                        starts.push_back(now);
                        return;
                    }
                }
            };

            debug!("Rate limit of {} per {:?} reached, waiting {:?}", self.limit, self.window, wait);
            tokio::time::sleep(wait).await;
        }
    }
}
