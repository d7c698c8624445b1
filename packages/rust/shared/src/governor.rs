//! Rate and concurrency governance for external service classes.
//!
//! One bounded pool per class (company fan-out, search, scrape, LLM,
//! person sub-pipelines) plus pacing for providers that rate-limit
//! aggressively. Every external call site acquires a permit first.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::config::LimitsConfig;

/// External service class, each with its own worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceClass {
    Company,
    Search,
    Scrape,
    Llm,
    Person,
}

/// Shared permit pools, sized from `[limits]` config.
pub struct Governor {
    company: Arc<Semaphore>,
    search: Arc<Semaphore>,
    scrape: Arc<Semaphore>,
    llm: Arc<Semaphore>,
    person: Arc<Semaphore>,
}

impl Governor {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            company: Arc::new(Semaphore::new(limits.company_concurrency.max(1) as usize)),
            search: Arc::new(Semaphore::new(limits.search_concurrency.max(1) as usize)),
            scrape: Arc::new(Semaphore::new(limits.scrape_concurrency.max(1) as usize)),
            llm: Arc::new(Semaphore::new(limits.llm_concurrency.max(1) as usize)),
            person: Arc::new(Semaphore::new(limits.person_concurrency.max(1) as usize)),
        }
    }

    /// Wait for a permit in the class pool. The permit is owned so it can
    /// cross `tokio::spawn` boundaries; dropping it releases the slot.
    pub async fn acquire(&self, class: ServiceClass) -> OwnedSemaphorePermit {
        let pool = match class {
            ServiceClass::Company => &self.company,
            ServiceClass::Search => &self.search,
            ServiceClass::Scrape => &self.scrape,
            ServiceClass::Llm => &self.llm,
            ServiceClass::Person => &self.person,
        };
        pool.clone()
            .acquire_owned()
            .await
            .expect("semaphore closed")
    }

    /// Permits currently available in a pool (used by tests).
    pub fn available(&self, class: ServiceClass) -> usize {
        match class {
            ServiceClass::Company => self.company.available_permits(),
            ServiceClass::Search => self.search.available_permits(),
            ServiceClass::Scrape => self.scrape.available_permits(),
            ServiceClass::Llm => self.llm.available_permits(),
            ServiceClass::Person => self.person.available_permits(),
        }
    }
}

/// Serializes calls to one provider and enforces a minimum gap between
/// them. Holding the internal lock across the sleep is intentional: it
/// keeps concurrent callers in a single file.
pub struct Pacer {
    min_interval: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Wait until at least `min_interval` has passed since the previous
    /// dispatch, then record this one.
    pub async fn wait(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Exponential backoff for 429-class retries: base * 2^attempt.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(6))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_secs(2);
        assert_eq!(backoff_delay(base, 0), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(8));
        // Capped exponent keeps the delay bounded.
        assert_eq!(backoff_delay(base, 30), backoff_delay(base, 6));
    }

    #[tokio::test]
    async fn governor_bounds_in_flight_permits() {
        let limits = LimitsConfig {
            search_concurrency: 2,
            ..Default::default()
        };
        let gov = Governor::new(&limits);

        let p1 = gov.acquire(ServiceClass::Search).await;
        let _p2 = gov.acquire(ServiceClass::Search).await;
        assert_eq!(gov.available(ServiceClass::Search), 0);

        drop(p1);
        assert_eq!(gov.available(ServiceClass::Search), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pacer_enforces_min_interval() {
        let pacer = Pacer::new(Duration::from_millis(2000));

        let start = Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(2000));
    }
}
