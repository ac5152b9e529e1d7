//! Built-agent cache keyed by fingerprint.
//!
//! Entries never expire on a timer; the only removal path is explicit
//! per-user invalidation after a credential change. The cache also owns
//! build deduplication: concurrent callers racing on the same fingerprint
//! share one in-flight build instead of duplicating its side effects.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OnceCell, RwLock};

use crate::engine::RunnableAgent;
use crate::error::GateError;

/// Identity of a cache slot for a built agent.
///
/// Two requests with an identical fingerprint reuse the same agent object;
/// differing model parameters imply a distinct configured engine instance,
/// so they never share one, even for the same user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    agent: String,
    // f64 is not Eq/Hash; the raw bits are, and identical inputs produce
    // identical bits.
    temperature_bits: Option<u64>,
    max_tokens: Option<u32>,
    user_id: String,
}

impl Fingerprint {
    pub fn new(
        agent: impl Into<String>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            agent: agent.into(),
            temperature_bits: temperature.map(f64::to_bits),
            max_tokens,
            user_id: user_id.into(),
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature_bits.map(f64::from_bits)
    }

    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

type Slot = Arc<OnceCell<Arc<dyn RunnableAgent>>>;

/// Process-local cache of built agents.
///
/// Holds nothing that cannot be recomputed from the credential store plus
/// capability logic; crash recovery is "start empty".
#[derive(Default)]
pub struct AgentCache {
    slots: RwLock<HashMap<Fingerprint, Slot>>,
}

impl AgentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached agent for `fingerprint`, or build it.
    ///
    /// At most one build runs per fingerprint at a time; concurrent callers
    /// wait for and share that build's result. A failed build caches
    /// nothing, so the next caller retries.
    pub async fn get_or_build<F, Fut>(
        &self,
        fingerprint: &Fingerprint,
        build: F,
    ) -> Result<Arc<dyn RunnableAgent>, GateError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Arc<dyn RunnableAgent>, GateError>>,
    {
        let slot = {
            let mut slots = self.slots.write().await;
            Arc::clone(slots.entry(fingerprint.clone()).or_default())
        };

        if let Some(agent) = slot.get() {
            tracing::debug!(user_id = fingerprint.user_id(), agent = fingerprint.agent(),
                "Agent cache hit");
            return Ok(Arc::clone(agent));
        }

        tracing::info!(user_id = fingerprint.user_id(), agent = fingerprint.agent(),
            "Agent cache miss, building");
        let agent = slot.get_or_try_init(build).await?;
        Ok(Arc::clone(agent))
    }

    /// Remove every entry whose fingerprint belongs to `user_id`, across
    /// all `(temperature, max_tokens)` variants: newly granted capabilities
    /// must appear in every future build for that user.
    ///
    /// Returns the number of entries removed.
    pub async fn invalidate_user(&self, user_id: &str) -> usize {
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|fp, _| fp.user_id() != user_id);
        let removed = before - slots.len();

        if removed > 0 {
            tracing::info!(user_id, removed, "Invalidated cached agents");
        }
        removed
    }

    /// Number of populated or in-flight slots (for tests and diagnostics).
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullAgent;

    #[async_trait]
    impl RunnableAgent for NullAgent {
        async fn run(&self, _messages: &[ChatMessage]) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    fn fp(user: &str, temperature: Option<f64>) -> Fingerprint {
        Fingerprint::new("demo", temperature, None, user)
    }

    #[tokio::test]
    async fn same_fingerprint_returns_same_object() {
        let cache = AgentCache::new();
        let build = || async { Ok(Arc::new(NullAgent) as Arc<dyn RunnableAgent>) };

        let first = cache.get_or_build(&fp("u1", Some(0.5)), build).await.unwrap();
        let second = cache.get_or_build(&fp("u1", Some(0.5)), build).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn different_parameters_do_not_share_agents() {
        let cache = AgentCache::new();
        let build = || async { Ok(Arc::new(NullAgent) as Arc<dyn RunnableAgent>) };

        let hot = cache.get_or_build(&fp("u1", Some(0.9)), build).await.unwrap();
        let cold = cache.get_or_build(&fp("u1", Some(0.1)), build).await.unwrap();

        assert!(!Arc::ptr_eq(&hot, &cold));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn concurrent_builds_run_once() {
        let cache = Arc::new(AgentCache::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let builds = Arc::clone(&builds);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_build(&fp("u1", None), || async move {
                        builds.fetch_add(1, Ordering::SeqCst);
                        // Widen the race window.
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok(Arc::new(NullAgent) as Arc<dyn RunnableAgent>)
                    })
                    .await
                    .unwrap()
            }));
        }

        let agents: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        for agent in &agents[1..] {
            assert!(Arc::ptr_eq(&agents[0], agent));
        }
    }

    #[tokio::test]
    async fn failed_build_caches_nothing() {
        let cache = AgentCache::new();

        let err = cache
            .get_or_build(&fp("u1", None), || async {
                Err(GateError::build("color", "bad credential"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::CapabilityBuild { .. }));

        // Next caller retries and succeeds.
        let agent = cache
            .get_or_build(&fp("u1", None), || async {
                Ok(Arc::new(NullAgent) as Arc<dyn RunnableAgent>)
            })
            .await;
        assert!(agent.is_ok());
    }

    #[tokio::test]
    async fn invalidation_removes_all_variants_for_user_only() {
        let cache = AgentCache::new();
        let build = || async { Ok(Arc::new(NullAgent) as Arc<dyn RunnableAgent>) };

        cache.get_or_build(&fp("u1", Some(0.1)), build).await.unwrap();
        cache.get_or_build(&fp("u1", Some(0.9)), build).await.unwrap();
        let other = cache.get_or_build(&fp("u2", Some(0.5)), build).await.unwrap();

        assert_eq!(cache.invalidate_user("u1").await, 2);
        assert_eq!(cache.len().await, 1);

        // u2's entry is untouched, identity preserved.
        let still = cache.get_or_build(&fp("u2", Some(0.5)), build).await.unwrap();
        assert!(Arc::ptr_eq(&other, &still));
    }
}
