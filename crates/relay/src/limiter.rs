//! Per-source request limiter: a keyed `governor` GCRA bucket.
//!
//! `max_requests` per `window_secs` becomes a burst of `max_requests`
//! refilled at one request every `window / max_requests`.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::HashMapStateStore;
use governor::{Quota, RateLimiter};

use rc_domain::config::RateLimitConfig;

/// Once this many sources are tracked, idle ones are dropped.
const SWEEP_THRESHOLD: usize = 4_096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Rejected; the source may send again in `retry_after_secs`.
    Limited { retry_after_secs: u64 },
}

pub struct SourceLimiter<C: Clock = DefaultClock> {
    limiter: RateLimiter<String, HashMapStateStore<String>, C, NoOpMiddleware<C::Instant>>,
    clock: C,
}

impl SourceLimiter {
    /// `None` when either bound is zero.
    pub fn new(max_requests: u32, window: Duration) -> Option<Self> {
        Self::with_clock(max_requests, window, DefaultClock::default())
    }

    /// `None` when limiting is disabled or the budget is unusable.
    pub fn from_config(cfg: &RateLimitConfig) -> Option<Self> {
        if !cfg.enabled {
            return None;
        }
        let limiter = Self::new(cfg.max_requests, Duration::from_secs(cfg.window_secs));
        if limiter.is_none() {
            tracing::warn!(
                max_requests = cfg.max_requests,
                window_secs = cfg.window_secs,
                "rate_limit budget is zero, limiting disabled"
            );
        }
        limiter
    }
}

impl<C: Clock> SourceLimiter<C> {
    pub fn with_clock(max_requests: u32, window: Duration, clock: C) -> Option<Self> {
        let burst = NonZeroU32::new(max_requests)?;
        let quota = Quota::with_period(window / max_requests)?.allow_burst(burst);
        Some(Self {
            limiter: RateLimiter::hashmap_with_clock(quota, &clock),
            clock,
        })
    }

    pub fn check(&self, source: &str) -> Decision {
        if self.limiter.len() >= SWEEP_THRESHOLD {
            self.limiter.retain_recent();
        }

        match self.limiter.check_key(&source.to_owned()) {
            Ok(()) => Decision::Allowed,
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                // Round up so clients never retry a moment too early.
                let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                Decision::Limited {
                    retry_after_secs: secs.max(1),
                }
            }
        }
    }

    pub fn tracked_sources(&self) -> usize {
        self.limiter.len()
    }
}
