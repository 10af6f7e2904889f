//! Request pacing and quota budgets.
//!
//! A [`Pacer`] spaces successive calls by a fixed interval; adapters use one
//! per instance (`1 / requests_per_second`) and the pipeline uses one for
//! classifications (`classify_delay_ms`). A [`QuotaBudget`] is an in-memory
//! unit counter for APIs with daily or per-run quotas.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Fixed-interval pacing between successive calls.
pub struct Pacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Pacer for a requests-per-second limit. Non-positive rates disable pacing.
    pub fn per_second(requests_per_second: f64) -> Self {
        let interval = if requests_per_second.is_finite() && requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::ZERO
        };
        Self::with_interval(interval)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next slot is free. The first call returns immediately.
    pub async fn wait(&self) {
        let mut next = self.next_slot.lock().await;
        if let Some(at) = *next {
            tokio::time::sleep_until(at).await;
        }
        *next = Some(Instant::now() + self.interval);
    }
}

/// Unit budget for a quota-limited API.
///
/// The first refused spend marks the budget exhausted; callers stop
/// issuing requests from then on, even ones that would still fit.
#[derive(Debug)]
pub struct QuotaBudget {
    name: &'static str,
    limit: u32,
    used: AtomicU32,
    exhausted: AtomicBool,
}

impl QuotaBudget {
    pub fn new(name: &'static str, limit: u32) -> Self {
        Self {
            name,
            limit,
            used: AtomicU32::new(0),
            exhausted: AtomicBool::new(false),
        }
    }

    /// Reserve `units`. Returns `false`, and logs, when that would exceed the limit.
    pub fn try_spend(&self, units: u32) -> bool {
        if self.is_exhausted() {
            return false;
        }
        let reserved = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                used.checked_add(units).filter(|total| *total <= self.limit)
            });
        match reserved {
            Ok(_) => true,
            Err(used) => {
                self.exhausted.store(true, Ordering::SeqCst);
                tracing::warn!(
                    quota = self.name,
                    used,
                    limit = self.limit,
                    requested = units,
                    "quota exhausted, skipping request"
                );
                false
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_stops_at_limit() {
        let budget = QuotaBudget::new("youtube", 102);
        assert!(budget.try_spend(1));
        assert!(budget.try_spend(100));
        assert!(!budget.is_exhausted());
        assert!(!budget.try_spend(100));
        assert!(budget.is_exhausted());
        assert_eq!(budget.used(), 101);
        // refused from here on, even though one unit is left
        assert!(!budget.try_spend(1));
        assert_eq!(budget.remaining(), 1);
    }

    #[test]
    fn rate_to_interval() {
        assert_eq!(Pacer::per_second(2.0).interval(), Duration::from_millis(500));
        assert_eq!(Pacer::per_second(0.0).interval(), Duration::ZERO);
    }

    #[tokio::test]
    async fn second_call_waits() {
        let pacer = Pacer::with_interval(Duration::from_millis(40));
        let start = std::time::Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() < Duration::from_millis(40));
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
