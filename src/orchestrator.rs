//! Per-turn configuration state machine.
//!
//! One pass per inbound user message, walking the capability registry in
//! registration order (never in parallel: dependency correctness relies on
//! the sequencing). The pass extracts and stores credentials, invalidates
//! caches when anything changed, and decides whether the turn is answered
//! with a configuration prompt or proceeds to the run engine.

use std::sync::Arc;

use crate::cache::AgentCache;
use crate::error::GateError;
use crate::prompt::ExternalPromptCache;
use crate::toolkit::CapabilityRegistry;

/// Outcome of one configuration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOutcome {
    /// Return this text to the user without invoking the run engine.
    Prompt(String),

    /// All required capabilities are configured; proceed to build/execute.
    Ready {
        /// Names of capabilities whose stored configuration changed this
        /// turn (caches for this user were invalidated).
        changed: Vec<String>,
        /// Optional capabilities the user explicitly asked for this turn;
        /// a build failure in one of these is fatal instead of omitting it.
        requested: Vec<String>,
    },
}

impl ConfigOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Drives the capability registry against incoming messages for one agent
/// type. Stateless across turns; all state lives in the credential store
/// and the caches it invalidates.
pub struct ConfigurationOrchestrator {
    registry: Arc<CapabilityRegistry>,
    agent_cache: Arc<AgentCache>,
    prompt_cache: Arc<ExternalPromptCache>,
}

impl ConfigurationOrchestrator {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        agent_cache: Arc<AgentCache>,
        prompt_cache: Arc<ExternalPromptCache>,
    ) -> Self {
        Self {
            registry,
            agent_cache,
            prompt_cache,
        }
    }

    /// Run the transition algorithm for one user message.
    ///
    /// Caller must hold the per-user lock: this mutates the user's
    /// credential records and cache entries.
    pub async fn run_turn(&self, message: &str, user_id: &str) -> Result<ConfigOutcome, GateError> {
        // Phase 1: extraction. Every capability sees the message, in order.
        let mut changed = Vec::new();
        for capability in self.registry.iter() {
            match capability.extract_and_store(message, user_id).await {
                Ok(Some(confirmation)) => {
                    tracing::info!(user_id, capability = capability.name(),
                        "Configuration changed this turn");
                    tracing::debug!(%confirmation);
                    changed.push(capability.name().to_string());
                }
                Ok(None) => {}
                Err(GateError::CredentialInvalid(reason)) => {
                    // Malformed credential: tell the user instead of
                    // silently re-prompting. Nothing was stored.
                    tracing::warn!(user_id, capability = capability.name(), %reason,
                        "Credential validation failed");
                    return Ok(ConfigOutcome::Prompt(format!(
                        "Configuration error: {reason}"
                    )));
                }
                Err(e) => return Err(e),
            }
        }

        // Phase 2: any change invalidates the built agent and the external
        // prompt for this user, regardless of which capability changed.
        if !changed.is_empty() {
            self.agent_cache.invalidate_user(user_id).await;
            self.prompt_cache.invalidate(user_id).await;
        }

        // Phase 3: readiness. The first unconfigured required capability
        // with a prompt decides the outcome; prompt-less ones (disabled
        // dependent features) are silently skipped.
        for capability in self.registry.iter() {
            if !capability.required() || capability.is_configured(user_id).await? {
                continue;
            }
            if let Some(prompt) = capability.config_prompt(user_id).await? {
                tracing::info!(user_id, capability = capability.name(),
                    "Required capability unconfigured, prompting");
                return Ok(ConfigOutcome::Prompt(prompt));
            }
            tracing::debug!(user_id, capability = capability.name(),
                "Required capability unconfigured but silent, skipping");
        }

        // Phase 4: optional capabilities interrupt only on explicit intent.
        let mut requested = Vec::new();
        for capability in self.registry.iter() {
            if capability.required() {
                continue;
            }
            if !capability.check_authorization_request(message, user_id).await? {
                continue;
            }
            if capability.is_configured(user_id).await? {
                requested.push(capability.name().to_string());
                continue;
            }
            if let Some(prompt) = capability.config_prompt(user_id).await? {
                tracing::info!(user_id, capability = capability.name(),
                    "Optional capability requested but unconfigured, prompting");
                return Ok(ConfigOutcome::Prompt(prompt));
            }
        }

        Ok(ConfigOutcome::Ready { changed, requested })
    }
}
