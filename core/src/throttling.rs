//! Outbound flood control
//!
//! A token bucket sits between the priority queue and the socket so that bursts of queued
//! lines are spread out enough to avoid "Excess Flood" disconnections. Lines sent at
//! [`SendPriority::Now`](crate::SendPriority::Now) never pass through it.

use crate::config::FloodConfig;
use std::time::{Duration, Instant};

/// Token bucket throttle for the sender loop
#[derive(Debug, Clone)]
pub struct FloodThrottle {
    enabled: bool,
    /// Tokens currently available
    tokens: f64,
    /// Bucket capacity
    capacity: f64,
    /// Tokens regained per second
    refill_per_second: f64,
    /// Last refill time
    last_refill: Instant,
    /// Number of times a line had to wait for a token
    throttled: u64,
}

impl FloodThrottle {
    /// Create a throttle from configuration, starting with a full bucket
    pub fn new(config: &FloodConfig) -> Self {
        Self::with_start(config, Instant::now())
    }

    fn with_start(config: &FloodConfig, now: Instant) -> Self {
        let capacity = config.burst.max(1) as f64;
        Self {
            enabled: config.enabled,
            tokens: capacity,
            capacity,
            refill_per_second: config.refill_per_second,
            last_refill: now,
            throttled: 0,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_second).min(self.capacity);
        self.last_refill = now;
    }

    /// Take a token if one is available at `now`
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            self.throttled += 1;
            false
        }
    }

    /// Take a token if one is available now
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// How long until the next token becomes available
    pub fn time_until_available(&self) -> Duration {
        if !self.enabled || self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((1.0 - self.tokens) / self.refill_per_second)
    }

    /// Whether the throttle limits anything at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of refused acquisitions
    pub fn throttled_count(&self) -> u64 {
        self.throttled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(burst: u32, refill: f64) -> FloodConfig {
        FloodConfig {
            enabled: true,
            burst,
            refill_per_second: refill,
        }
    }

    #[test]
    fn test_burst_then_throttled() {
        let start = Instant::now();
        let mut throttle = FloodThrottle::with_start(&config(3, 1.0), start);
        assert!(throttle.try_acquire_at(start));
        assert!(throttle.try_acquire_at(start));
        assert!(throttle.try_acquire_at(start));
        assert!(!throttle.try_acquire_at(start));
        assert_eq!(throttle.throttled_count(), 1);
        assert!(throttle.time_until_available() > Duration::ZERO);
    }

    #[test]
    fn test_refill_over_time() {
        let start = Instant::now();
        let mut throttle = FloodThrottle::with_start(&config(2, 2.0), start);
        assert!(throttle.try_acquire_at(start));
        assert!(throttle.try_acquire_at(start));
        assert!(!throttle.try_acquire_at(start));

        let later = start + Duration::from_millis(500);
        assert!(throttle.try_acquire_at(later));
        assert!(!throttle.try_acquire_at(later));

        // Refill never exceeds the burst size
        let much_later = later + Duration::from_secs(60);
        assert!(throttle.try_acquire_at(much_later));
        assert!(throttle.try_acquire_at(much_later));
        assert!(!throttle.try_acquire_at(much_later));
    }

    #[test]
    fn test_disabled_never_blocks() {
        let mut cfg = config(1, 0.1);
        cfg.enabled = false;
        let mut throttle = FloodThrottle::new(&cfg);
        for _ in 0..100 {
            assert!(throttle.try_acquire());
        }
        assert_eq!(throttle.time_until_available(), Duration::ZERO);
    }
}
