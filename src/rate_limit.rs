//! Per-client admission control for extraction requests.
//!
//! This is a best-effort flood guard, not a security control. State lives in
//! memory and disappears with the process.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use crate::prelude::*;

/// The period over which the rate limit is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitPeriod {
    /// Per second.
    Second,
    /// Per minute.
    Minute,
}

impl RateLimitPeriod {
    /// Convert this period to a number of seconds.
    pub fn to_duration(self) -> Duration {
        match self {
            RateLimitPeriod::Second => Duration::from_secs(1),
            RateLimitPeriod::Minute => Duration::from_secs(60),
        }
    }
}

impl fmt::Display for RateLimitPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitPeriod::Second => write!(f, "s"),
            RateLimitPeriod::Minute => write!(f, "m"),
        }
    }
}

impl FromStr for RateLimitPeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "s" => Ok(RateLimitPeriod::Second),
            "m" => Ok(RateLimitPeriod::Minute),
            _ => Err(anyhow!("Unsupported rate limit period: {:?}", s)),
        }
    }
}

/// A rate limit, written as `12/m` or `5/s`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimit {
    /// The maximum number of requests allowed in the period.
    pub max_requests: usize,
    /// The period over which the rate limit is applied.
    pub per_period: RateLimitPeriod,
}

impl RateLimit {
    /// Create a new [`RateLimit`].
    pub fn new(max_requests: usize, per_period: RateLimitPeriod) -> Self {
        Self {
            max_requests,
            per_period,
        }
    }
}

impl Default for RateLimit {
    /// Twelve requests per minute.
    fn default() -> Self {
        Self::new(12, RateLimitPeriod::Minute)
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.max_requests, self.per_period)
    }
}

impl FromStr for RateLimit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse = |s: &str| -> Result<_> {
            let mut parts = s.splitn(2, '/');
            let max_requests = parts
                .next()
                .ok_or_else(|| anyhow!("Missing max requests"))?
                .parse::<usize>()?;
            let per_period = parts
                .next()
                .ok_or_else(|| anyhow!("Missing period"))?
                .parse::<RateLimitPeriod>()?;
            Ok(Self {
                max_requests,
                per_period,
            })
        };
        parse(s).with_context(|| format!("Failed to parse rate limit: {:?}", s))
    }
}

/// A source of "now". Swappable so tests can move time by hand.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// The real monotonic clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Request timestamps for one client, oldest first.
type Window = Arc<Mutex<VecDeque<Instant>>>;

/// A sliding-window limiter keyed by client identity.
///
/// Each key has its own lock, so prune, check and record happen atomically
/// for a client without serializing unrelated clients. Keys are never
/// removed; memory is bounded by the number of distinct clients seen.
pub struct SlidingWindowLimiter {
    limit: RateLimit,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, Window>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter using the system clock.
    pub fn new(limit: RateLimit) -> Self {
        Self::with_clock(limit, Arc::new(SystemClock))
    }

    /// Create a limiter with a custom clock.
    pub fn with_clock(limit: RateLimit, clock: Arc<dyn Clock>) -> Self {
        Self {
            limit,
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Should we accept another request from `key`? Accepted requests are
    /// recorded; rejected ones are not.
    pub fn admit(&self, key: &str) -> bool {
        let window = self.window_for(key);
        let mut stamps = window.lock().unwrap_or_else(PoisonError::into_inner);

        let now = self.clock.now();
        let period = self.limit.per_period.to_duration();
        while let Some(&oldest) = stamps.front() {
            if oldest + period <= now {
                stamps.pop_front();
            } else {
                break;
            }
        }

        if stamps.len() < self.limit.max_requests {
            stamps.push_back(now);
            true
        } else {
            debug!(client = key, limit = %self.limit, "Rejecting request");
            false
        }
    }

    /// Find or create the window for `key`.
    fn window_for(&self, key: &str) -> Window {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.entry(key.to_owned()).or_default().clone()
    }
}
