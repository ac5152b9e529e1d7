//! Run-engine contracts.
//!
//! The engine that actually executes a configured agent against a
//! conversation is an external collaborator. This module defines the seam:
//! the orchestration core hands the engine a fully composed
//! [`AgentBlueprint`] and gets back a [`RunnableAgent`] it caches and
//! reuses. Errors at this seam are `anyhow` like the other client traits;
//! the wrapper converts them at the boundary.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::chat::ChatMessage;
use crate::toolkit::Toolkit;

/// Model parameters forwarded to the engine.
#[derive(Debug, Clone, Default)]
pub struct ModelParams {
    /// Model identifier (engine format)
    pub model_id: String,
    /// Sampling temperature
    pub temperature: Option<f64>,
    /// Maximum output tokens
    pub max_tokens: Option<u32>,
}

/// Everything the engine needs to construct an executable agent.
///
/// The instruction list is composed once at build time and never mutated
/// afterwards; changing it requires building a new agent through cache
/// invalidation.
pub struct AgentBlueprint {
    pub name: String,
    pub description: String,
    pub instructions: Vec<String>,
    pub toolkits: Vec<Arc<dyn Toolkit>>,
    pub model: ModelParams,
    pub user_id: String,
    /// Conversation-history continuity key; engine-internal concern
    pub session_id: Option<String>,
}

/// Factory for executable agents.
#[async_trait]
pub trait RunEngine: Send + Sync {
    /// Build an executable agent from a blueprint.
    async fn build(&self, blueprint: AgentBlueprint) -> anyhow::Result<Arc<dyn RunnableAgent>>;
}

/// An executable agent produced by the engine.
#[async_trait]
pub trait RunnableAgent: Send + Sync {
    /// Run to completion and return the full response text.
    async fn run(&self, messages: &[ChatMessage]) -> anyhow::Result<String>;

    /// Stream incremental output fragments.
    ///
    /// The default implementation runs to completion and yields the result
    /// as a single fragment, for engines without native streaming.
    async fn run_streaming(
        &self,
        messages: &[ChatMessage],
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>> {
        let text = self.run(messages).await?;
        Ok(Box::pin(futures::stream::once(async move {
            Ok::<_, anyhow::Error>(text)
        })))
    }
}

impl std::fmt::Debug for dyn RunnableAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RunnableAgent")
    }
}
