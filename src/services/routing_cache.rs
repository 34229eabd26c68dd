//! Cached routing decisions scoped per conversation.
//!
//! Routing a task to agents is expensive (it runs an LLM reasoning step), so
//! decisions are cached for the configured TTL under a key of the form
//! `<conversation_id>::<fingerprint>`. When a conversation ends or is reset,
//! every decision cached for it can be dropped in one call without touching
//! other conversations.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::errors::CacheResult;
use crate::domain::models::{CacheConfig, CacheStats};
use crate::services::ttl_cache::ConcurrentTtlCache;

/// Separator between the conversation id and the task fingerprint.
pub const ROUTING_KEY_SEPARATOR: &str = "::";

/// A task that needs routing within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRequest {
    /// Conversation the task belongs to.
    pub conversation_id: String,
    /// Task text as submitted by the user.
    pub task: String,
    /// Extra routing context (available agents, tool set, ...).
    pub context: Option<String>,
}

impl RoutingRequest {
    pub fn new(conversation_id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            task: task.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// How the assigned agents execute a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// A single agent handles the task.
    Delegated,
    /// Agents run one after another.
    Sequential,
    /// Agents run concurrently.
    Parallel,
}

/// Outcome of routing a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Agents selected for the task, in execution order.
    pub assigned_agents: Vec<String>,
    /// Execution mode for the selected agents.
    pub execution_mode: ExecutionMode,
    /// Subtasks produced while routing, if the task was decomposed.
    #[serde(default)]
    pub subtasks: Vec<String>,
    /// Why this routing was chosen.
    pub reasoning: String,
}

/// Produces routing decisions.
#[async_trait]
pub trait RoutingPolicy: Send + Sync {
    /// Route a single task.
    async fn route(&self, request: &RoutingRequest) -> anyhow::Result<RoutingDecision>;
}

/// Build the cache key for a routing request.
///
/// Task and context are hashed with length prefixes so that shifting text
/// between the two fields cannot produce the same fingerprint.
pub fn routing_key(request: &RoutingRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update((request.task.len() as u64).to_le_bytes());
    hasher.update(request.task.as_bytes());
    match &request.context {
        Some(context) => {
            hasher.update([1u8]);
            hasher.update((context.len() as u64).to_le_bytes());
            hasher.update(context.as_bytes());
        }
        None => hasher.update([0u8]),
    }
    format!(
        "{}{}{:x}",
        request.conversation_id,
        ROUTING_KEY_SEPARATOR,
        hasher.finalize()
    )
}

/// Recover the conversation id from a routing key.
pub fn conversation_scope(key: &str) -> Option<String> {
    key.rsplit_once(ROUTING_KEY_SEPARATOR)
        .map(|(conversation_id, _)| conversation_id.to_string())
}

/// Caching decorator for any [`RoutingPolicy`].
///
/// Concurrent requests for the same task in the same conversation share a
/// single call to the wrapped policy.
pub struct CachedRoutingPolicy<P: RoutingPolicy> {
    inner: Arc<P>,
    cache: ConcurrentTtlCache<String, Arc<RoutingDecision>>,
}

impl<P: RoutingPolicy + 'static> CachedRoutingPolicy<P> {
    /// Wrap a policy with a conversation-scoped cache.
    pub fn new(inner: Arc<P>, config: &CacheConfig) -> CacheResult<Self> {
        let cache = ConcurrentTtlCache::with_scope_extractor(
            config.ttl_seconds,
            config.max_size,
            |key: &String| conversation_scope(key),
        )?;
        Ok(Self { inner, cache })
    }

    /// Route through the cache, returning a shared decision.
    pub async fn route_shared(&self, request: &RoutingRequest) -> CacheResult<Arc<RoutingDecision>> {
        let key = routing_key(request);
        let inner = Arc::clone(&self.inner);
        let request = request.clone();

        self.cache
            .get_or_compute(key, move || async move {
                inner.route(&request).await.map(Arc::new)
            })
            .await
    }

    /// Drop every decision cached for a conversation.
    pub fn end_conversation(&self, conversation_id: &str) -> CacheResult<usize> {
        self.cache.invalidate_scope(conversation_id)
    }

    /// Cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Handle to the underlying cache, e.g. for a sweeper.
    pub fn cache(&self) -> &ConcurrentTtlCache<String, Arc<RoutingDecision>> {
        &self.cache
    }
}

#[async_trait]
impl<P: RoutingPolicy + 'static> RoutingPolicy for CachedRoutingPolicy<P> {
    async fn route(&self, request: &RoutingRequest) -> anyhow::Result<RoutingDecision> {
        let decision = self.route_shared(request).await?;
        Ok((*decision).clone())
    }
}
