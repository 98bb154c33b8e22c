//! Per-registry outbound request budget
//!
//! Calls are never dropped: when the budget is spent, `acquire` sleeps until a
//! slot frees up. Only the owning client waits; other registries are unaffected.

use crate::registry::types::DeclaredRateLimit;
use crate::utils::events::{EventBus, HubEvent};
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Budget used when a registry declares none
pub const FALLBACK_RATE_LIMIT: DeclaredRateLimit = DeclaredRateLimit {
    requests: 30,
    window_secs: 60,
};

/// What a response told us about the remaining budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitUpdate {
    /// The catalog sent explicit limit/remaining/reset headers
    Provided {
        limit: u32,
        remaining: u32,
        reset_after: Duration,
    },
    /// No headers; rely on local accounting
    Estimated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaSource {
    Provided,
    Estimated,
}

/// Snapshot of a registry's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub limit: u32,
    pub consumed: u32,
    pub reset_at: Instant,
    pub source: QuotaSource,
}

#[derive(Debug)]
struct Window {
    limit: u32,
    consumed: u32,
    reset_at: Instant,
    source: QuotaSource,
    /// Start times of calls made within the last window
    recent: VecDeque<Instant>,
}

impl Window {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(front) = self.recent.front() {
            if now.duration_since(*front) >= window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time to wait before another call may start, if any
    fn wait_needed(&mut self, now: Instant, window: Duration) -> Option<Duration> {
        self.prune(now, window);

        if self.source == QuotaSource::Provided {
            if now >= self.reset_at {
                self.source = QuotaSource::Estimated;
                self.consumed = self.recent.len() as u32;
            } else if self.consumed >= self.limit {
                return Some(self.reset_at - now);
            }
        }

        if self.recent.len() as u32 >= self.limit {
            let oldest = *self.recent.front()?;
            return Some((oldest + window).saturating_duration_since(now));
        }
        None
    }
}

pub struct RateLimiter {
    registry_id: String,
    window: Duration,
    state: Mutex<Window>,
    events: EventBus,
}

impl RateLimiter {
    pub fn new(registry_id: impl Into<String>, declared: DeclaredRateLimit, events: EventBus) -> Self {
        let window = Duration::from_secs(declared.window_secs.max(1));
        Self {
            registry_id: registry_id.into(),
            window,
            state: Mutex::new(Window {
                limit: declared.requests.max(1),
                consumed: 0,
                reset_at: Instant::now() + window,
                source: QuotaSource::Estimated,
                recent: VecDeque::new(),
            }),
            events,
        }
    }

    /// Reserve one call, sleeping until the budget allows it.
    ///
    /// Returns how long the caller was delayed.
    pub async fn acquire(&self) -> Duration {
        let mut state = self.state.lock().await;
        let started = Instant::now();

        while let Some(wait) = state.wait_needed(Instant::now(), self.window) {
            warn!(
                "Registry '{}' rate limit reached, waiting {}ms",
                self.registry_id,
                wait.as_millis()
            );
            self.events.publish(HubEvent::RateLimited {
                registry_id: self.registry_id.clone(),
                wait_ms: wait.as_millis() as u64,
            });
            tokio::time::sleep(wait).await;
        }

        let now = Instant::now();
        state.recent.push_back(now);
        state.consumed += 1;
        if state.source == QuotaSource::Estimated {
            state.reset_at = state.recent.front().copied().unwrap_or(now) + self.window;
        }
        now - started
    }

    /// Fold a response's rate-limit information into the counters
    pub async fn record(&self, update: RateLimitUpdate) {
        let mut state = self.state.lock().await;
        match update {
            RateLimitUpdate::Provided {
                limit,
                remaining,
                reset_after,
            } => {
                debug!(
                    "Registry '{}' reports {}/{} requests left, reset in {}s",
                    self.registry_id,
                    remaining,
                    limit,
                    reset_after.as_secs()
                );
                state.limit = limit.max(1);
                state.consumed = limit.saturating_sub(remaining);
                state.reset_at = Instant::now() + reset_after;
                state.source = QuotaSource::Provided;
            }
            // Already counted when the call was reserved.
            RateLimitUpdate::Estimated => {}
        }
    }

    pub async fn state(&self) -> RateLimitState {
        let state = self.state.lock().await;
        RateLimitState {
            limit: state.limit,
            consumed: state.consumed,
            reset_at: state.reset_at,
            source: state.source,
        }
    }
}

/// Read `x-ratelimit-*` headers. `now_epoch_secs` converts the absolute reset
/// timestamp into a relative delay.
pub fn parse_rate_limit_headers(headers: &HeaderMap, now_epoch_secs: u64) -> RateLimitUpdate {
    let read = |name: &str| -> Option<u64> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };

    match (
        read("x-ratelimit-limit"),
        read("x-ratelimit-remaining"),
        read("x-ratelimit-reset"),
    ) {
        (Some(limit), Some(remaining), Some(reset)) => RateLimitUpdate::Provided {
            limit: limit.min(u32::MAX as u64) as u32,
            remaining: remaining.min(u32::MAX as u64) as u32,
            reset_after: Duration::from_secs(reset.saturating_sub(now_epoch_secs)),
        },
        _ => RateLimitUpdate::Estimated,
    }
}
