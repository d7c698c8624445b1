//! Ordered provider chains with fallback on qualifying failures.
//!
//! One chain instance backs each stage: search (primary -> free), scrape
//! (inline -> direct fetch -> reader service), extraction (primary LLM ->
//! secondary LLM). A provider that reports an outage is skipped for the
//! rest of the run; health never persists beyond process lifetime.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ProspectorError, Result};

/// How a provider attempt failed.
#[derive(Debug, Clone)]
pub enum ProviderFailure {
    /// This request failed here; try the next provider. The provider
    /// stays healthy for future requests (e.g. one URL timing out).
    Qualifying(String),
    /// Provider-level failure (quota/billing exhaustion, declared
    /// unsupported). Try the next provider and stop probing this one.
    Outage(String),
    /// The request itself is unusable. No other provider is tried.
    Fatal(String),
}

impl ProviderFailure {
    pub fn qualifying(msg: impl Into<String>) -> Self {
        Self::Qualifying(msg.into())
    }

    pub fn outage(msg: impl Into<String>) -> Self {
        Self::Outage(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    fn message(&self) -> &str {
        match self {
            Self::Qualifying(m) | Self::Outage(m) | Self::Fatal(m) => m,
        }
    }
}

/// One interchangeable backend for a stage operation.
#[async_trait]
pub trait Provider<Req, Resp>: Send + Sync
where
    Req: Send + Sync,
    Resp: Send,
{
    /// Short stable name used in logs and exhaustion errors.
    fn name(&self) -> &str;

    async fn attempt(&self, req: &Req) -> std::result::Result<Resp, ProviderFailure>;
}

struct Slot<Req, Resp> {
    provider: Box<dyn Provider<Req, Resp>>,
    healthy: AtomicBool,
}

/// An ordered list of providers tried in sequence until one succeeds.
pub struct FallbackChain<Req, Resp> {
    stage: String,
    slots: Vec<Slot<Req, Resp>>,
}

impl<Req, Resp> FallbackChain<Req, Resp>
where
    Req: Send + Sync,
    Resp: Send,
{
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            slots: Vec::new(),
        }
    }

    pub fn with(mut self, provider: Box<dyn Provider<Req, Resp>>) -> Self {
        self.slots.push(Slot {
            provider,
            healthy: AtomicBool::new(true),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Providers still considered healthy.
    pub fn healthy_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.healthy.load(Ordering::Relaxed))
            .count()
    }

    /// Try each provider in order. Returns the first success, a fatal
    /// error as-is, or `ChainExhausted` listing every attempt.
    pub async fn execute(&self, req: &Req) -> Result<Resp> {
        let mut attempted: Vec<(String, String)> = Vec::new();

        for slot in &self.slots {
            let name = slot.provider.name().to_string();

            if !slot.healthy.load(Ordering::Relaxed) {
                debug!(stage = %self.stage, provider = %name, "skipping unhealthy provider");
                attempted.push((name, "skipped: marked unhealthy".into()));
                continue;
            }

            match slot.provider.attempt(req).await {
                Ok(resp) => {
                    if !attempted.is_empty() {
                        debug!(
                            stage = %self.stage,
                            provider = %name,
                            fallbacks = attempted.len(),
                            "request served by fallback provider"
                        );
                    }
                    return Ok(resp);
                }
                Err(ProviderFailure::Qualifying(msg)) => {
                    warn!(stage = %self.stage, provider = %name, error = %msg, "provider failed, trying next");
                    attempted.push((name, msg));
                }
                Err(ProviderFailure::Outage(msg)) => {
                    warn!(
                        stage = %self.stage,
                        provider = %name,
                        error = %msg,
                        "provider outage, disabling for the rest of the run"
                    );
                    slot.healthy.store(false, Ordering::Relaxed);
                    attempted.push((name, msg));
                }
                Err(failure @ ProviderFailure::Fatal(_)) => {
                    return Err(ProspectorError::validation(format!(
                        "{}/{name}: {}",
                        self.stage,
                        failure.message()
                    )));
                }
            }
        }

        Err(ProspectorError::chain_exhausted(attempted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    struct FixedProvider {
        name: &'static str,
        outcome: std::result::Result<&'static str, ProviderFailure>,
        calls: Arc<AtomicUsize>,
    }

    impl FixedProvider {
        fn ok(name: &'static str, value: &'static str) -> Box<Self> {
            Box::new(Self {
                name,
                outcome: Ok(value),
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn failing(name: &'static str, failure: ProviderFailure) -> Box<Self> {
            Box::new(Self {
                name,
                outcome: Err(failure),
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn counted(
            name: &'static str,
            failure: ProviderFailure,
            calls: Arc<AtomicUsize>,
        ) -> Box<Self> {
            Box::new(Self {
                name,
                outcome: Err(failure),
                calls,
            })
        }
    }

    #[async_trait]
    impl Provider<String, String> for FixedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn attempt(&self, _req: &String) -> std::result::Result<String, ProviderFailure> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            match &self.outcome {
                Ok(v) => Ok(v.to_string()),
                Err(f) => Err(f.clone()),
            }
        }
    }

    #[tokio::test]
    async fn second_provider_serves_after_qualifying_failure() {
        let chain = FallbackChain::new("search")
            .with(FixedProvider::failing(
                "primary",
                ProviderFailure::qualifying("HTTP 500"),
            ))
            .with(FixedProvider::ok("free", "hits"));

        let result = chain.execute(&"q".to_string()).await.expect("fallback");
        assert_eq!(result, "hits");
        // Qualifying is not sticky.
        assert_eq!(chain.healthy_count(), 2);
    }

    #[tokio::test]
    async fn exhaustion_lists_every_provider() {
        let chain = FallbackChain::new("search")
            .with(FixedProvider::failing(
                "primary",
                ProviderFailure::qualifying("HTTP 402"),
            ))
            .with(FixedProvider::failing(
                "free",
                ProviderFailure::qualifying("rate limited"),
            ));

        let err = chain.execute(&"q".to_string()).await.unwrap_err();
        match err {
            ProspectorError::ChainExhausted { attempted, .. } => {
                assert_eq!(attempted.len(), 2);
                assert_eq!(attempted[0].0, "primary");
                assert_eq!(attempted[1].0, "free");
            }
            other => panic!("expected ChainExhausted, got {other}"),
        }
    }

    #[tokio::test]
    async fn outage_is_sticky_across_requests() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::new("llm")
            .with(FixedProvider::counted(
                "primary",
                ProviderFailure::outage("billing exhausted"),
                calls.clone(),
            ))
            .with(FixedProvider::ok("secondary", "done"));

        assert_eq!(chain.execute(&"a".to_string()).await.expect("first"), "done");
        assert_eq!(chain.healthy_count(), 1);

        // Second request skips the dead provider entirely.
        assert_eq!(chain.execute(&"b".to_string()).await.expect("second"), "done");
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn fatal_failure_short_circuits() {
        let chain = FallbackChain::new("scrape")
            .with(FixedProvider::failing(
                "direct",
                ProviderFailure::fatal("unsupported scheme"),
            ))
            .with(FixedProvider::ok("reader", "never reached"));

        let err = chain.execute(&"ftp://x".to_string()).await.unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
        assert!(!matches!(err, ProspectorError::ChainExhausted { .. }));
    }
}
