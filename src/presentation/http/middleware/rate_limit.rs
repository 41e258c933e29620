use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding-window limiter for login attempts, keyed by source address.
pub struct LoginRateLimiter {
    max_per_window: usize,
    window: Duration,
    attempts: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl LoginRateLimiter {
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt; false means the caller is over the limit.
    pub fn allow(&self, addr: IpAddr) -> bool {
        let now = Instant::now();
        let mut attempts = self.attempts.lock().expect("rate limiter poisoned");

        let window = self.window;
        let entry = attempts.entry(addr).or_default();
        while let Some(front) = entry.front() {
            if now.duration_since(*front) > window {
                entry.pop_front();
            } else {
                break;
            }
        }

        if entry.len() >= self.max_per_window {
            return false;
        }
        entry.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_enforced_per_address() {
        let limiter = LoginRateLimiter::new(3, Duration::from_secs(60));
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.allow(a));
        assert!(limiter.allow(a));
        assert!(limiter.allow(a));
        assert!(!limiter.allow(a));

        // Separate address, separate budget.
        assert!(limiter.allow(b));
    }

    #[test]
    fn test_window_expiry_restores_budget() {
        let limiter = LoginRateLimiter::new(1, Duration::from_millis(10));
        let addr: IpAddr = "10.0.0.3".parse().unwrap();

        assert!(limiter.allow(addr));
        assert!(!limiter.allow(addr));
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.allow(addr));
    }
}
