//! Common test utilities for integration tests
//!
//! Provides shared fixtures and helpers used across multiple integration
//! test files.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use routing_cache::services::ExecutionMode;
use routing_cache::{RoutingDecision, RoutingPolicy, RoutingRequest};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Routing policy stub that counts calls and can be slowed down or made to fail.
#[allow(dead_code)]
pub struct CountingPolicy {
    calls: AtomicUsize,
    delay: Duration,
    fail: bool,
}

#[allow(dead_code)]
impl CountingPolicy {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoutingPolicy for CountingPolicy {
    async fn route(&self, request: &RoutingRequest) -> anyhow::Result<RoutingDecision> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            anyhow::bail!("router unavailable for {}", request.conversation_id);
        }

        Ok(RoutingDecision {
            assigned_agents: vec!["general-purpose".to_string()],
            execution_mode: ExecutionMode::Delegated,
            subtasks: Vec::new(),
            reasoning: format!("call #{call} for task '{}'", request.task),
        })
    }
}
