//! Agent lifecycle wrapper and the service entry point.
//!
//! [`AgentLifecycleWrapper`] is the per-agent-type pipeline: configuration
//! pass, cache lookup, build, delegate to the run engine.
//! [`AgentService`] routes inbound model names to wrappers and owns the
//! state shared across agent types: the agent cache, the external prompt
//! cache and the per-user lock table.
//!
//! ## Concurrency
//!
//! Requests for different users run fully in parallel. Requests for the
//! same user serialize their configuration pass through a per-user lock
//! (credential writes and cache invalidation are single-writer per user).
//! Builds happen outside that lock; deduplication of same-fingerprint
//! builds is the cache's job.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::BoxStream;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::agents::AgentDefinition;
use crate::cache::{AgentCache, Fingerprint};
use crate::chat::{AgentReply, ChatRequest};
use crate::config::GateConfig;
use crate::credentials::CredentialStore;
use crate::engine::{AgentBlueprint, ModelParams, RunEngine, RunnableAgent};
use crate::error::GateError;
use crate::orchestrator::{ConfigOutcome, ConfigurationOrchestrator};
use crate::prompt::{ExternalPromptCache, PromptComposer};
use crate::toolkit::{CapabilityRegistry, RegistryError};

/// Model name prefix the transport may leave on requests.
const MODEL_PREFIX: &str = "agentgate/";

/// Per-user mutual exclusion, preserving cross-user parallelism.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `user_id`, creating it on first use.
    pub async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(user_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Per-agent-type request pipeline.
pub struct AgentLifecycleWrapper {
    name: String,
    description: String,
    model_id: String,
    registry: Arc<CapabilityRegistry>,
    orchestrator: ConfigurationOrchestrator,
    composer: PromptComposer,
    engine: Arc<dyn RunEngine>,
    cache: Arc<AgentCache>,
    user_locks: Arc<UserLocks>,
}

impl AgentLifecycleWrapper {
    /// Assemble the pipeline for one agent definition.
    pub fn new(
        definition: &dyn AgentDefinition,
        store: Arc<dyn CredentialStore>,
        config: &GateConfig,
        engine: Arc<dyn RunEngine>,
        cache: Arc<AgentCache>,
        prompt_cache: Arc<ExternalPromptCache>,
        user_locks: Arc<UserLocks>,
    ) -> Result<Self, RegistryError> {
        let toolchain = definition.build_toolchain(store, config)?;
        let registry = Arc::new(toolchain.registry);

        let orchestrator = ConfigurationOrchestrator::new(
            Arc::clone(&registry),
            Arc::clone(&cache),
            Arc::clone(&prompt_cache),
        );
        let composer = PromptComposer::new(
            definition.base_instructions(),
            toolchain.prompt_extension,
            prompt_cache,
            Arc::clone(&registry),
        );

        tracing::info!(agent = definition.name(), capabilities = registry.len(),
            "Initialized agent wrapper");

        Ok(Self {
            name: definition.name().to_string(),
            description: definition.description().to_string(),
            model_id: definition.model_id(config),
            registry,
            orchestrator,
            composer,
            engine,
            cache,
            user_locks,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle one request to completion.
    ///
    /// Returns a configuration prompt without touching the run engine when
    /// the user is not ready; otherwise builds or reuses the agent and
    /// delegates execution.
    pub async fn handle(&self, request: &ChatRequest) -> Result<AgentReply, GateError> {
        match self.configure(request).await? {
            ConfigOutcome::Prompt(prompt) => Ok(AgentReply::Prompt(prompt)),
            ConfigOutcome::Ready { requested, .. } => {
                let agent = self.agent_for(request, &requested).await?;
                let text = agent
                    .run(&request.messages)
                    .await
                    .map_err(|e| GateError::Engine(e.to_string()))?;
                Ok(AgentReply::Completion(text))
            }
        }
    }

    /// Handle one request as a fragment stream.
    ///
    /// A configuration prompt surfaces as a single-fragment stream so the
    /// transport needs no separate path for it.
    pub async fn handle_streaming(
        &self,
        request: &ChatRequest,
    ) -> Result<BoxStream<'static, anyhow::Result<String>>, GateError> {
        match self.configure(request).await? {
            ConfigOutcome::Prompt(prompt) => Ok(Box::pin(futures::stream::once(async move {
                Ok::<_, anyhow::Error>(prompt)
            }))),
            ConfigOutcome::Ready { requested, .. } => {
                let agent = self.agent_for(request, &requested).await?;
                agent
                    .run_streaming(&request.messages)
                    .await
                    .map_err(|e| GateError::Engine(e.to_string()))
            }
        }
    }

    /// Run the configuration pass under the per-user lock.
    async fn configure(&self, request: &ChatRequest) -> Result<ConfigOutcome, GateError> {
        let message = request.latest_user_message();
        let _guard = self.user_locks.acquire(&request.user_id).await;
        self.orchestrator.run_turn(&message, &request.user_id).await
    }

    /// Fetch the cached agent for this request's fingerprint, or build it.
    async fn agent_for(
        &self,
        request: &ChatRequest,
        requested: &[String],
    ) -> Result<Arc<dyn RunnableAgent>, GateError> {
        let fingerprint = Fingerprint::new(
            &self.name,
            request.temperature,
            request.max_tokens,
            &request.user_id,
        );

        self.cache
            .get_or_build(&fingerprint, || self.build_agent(request, requested))
            .await
    }

    /// Build every configured capability, compose the prompt and hand the
    /// blueprint to the run engine.
    async fn build_agent(
        &self,
        request: &ChatRequest,
        requested: &[String],
    ) -> Result<Arc<dyn RunnableAgent>, GateError> {
        let user_id = request.user_id.as_str();
        let mut toolkits = Vec::new();

        for capability in self.registry.iter() {
            if !capability.is_configured(user_id).await? {
                continue;
            }
            match capability.build(user_id).await {
                Ok(Some(toolkit)) => toolkits.push(toolkit),
                Ok(None) => {}
                Err(e) => {
                    let explicitly_requested =
                        requested.iter().any(|name| name == capability.name());
                    if capability.required() || explicitly_requested {
                        return Err(e);
                    }
                    // Optional and not asked for this turn: omit it.
                    tracing::warn!(user_id, capability = capability.name(), error = %e,
                        "Omitting optional capability after build failure");
                }
            }
        }

        let instructions = self.composer.compose(user_id).await?;

        let blueprint = AgentBlueprint {
            name: self.name.clone(),
            description: self.description.clone(),
            instructions,
            toolkits,
            model: ModelParams {
                model_id: self.model_id.clone(),
                temperature: request.temperature,
                max_tokens: request.max_tokens,
            },
            user_id: request.user_id.clone(),
            session_id: request.session_id.clone(),
        };

        tracing::info!(user_id, agent = %self.name, toolkits = blueprint.toolkits.len(),
            "Building agent");
        self.engine
            .build(blueprint)
            .await
            .map_err(|e| GateError::Engine(e.to_string()))
    }
}

/// Entry point: routes requests to registered agent wrappers.
pub struct AgentService {
    store: Arc<dyn CredentialStore>,
    config: GateConfig,
    engine: Arc<dyn RunEngine>,
    cache: Arc<AgentCache>,
    prompt_cache: Arc<ExternalPromptCache>,
    user_locks: Arc<UserLocks>,
    wrappers: HashMap<String, Arc<AgentLifecycleWrapper>>,
}

impl AgentService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        config: GateConfig,
        engine: Arc<dyn RunEngine>,
    ) -> Self {
        Self {
            store,
            config,
            engine,
            cache: Arc::new(AgentCache::new()),
            prompt_cache: Arc::new(ExternalPromptCache::new()),
            user_locks: Arc::new(UserLocks::new()),
            wrappers: HashMap::new(),
        }
    }

    /// Register an agent definition under its name.
    pub fn register(&mut self, definition: &dyn AgentDefinition) -> Result<(), RegistryError> {
        let wrapper = AgentLifecycleWrapper::new(
            definition,
            Arc::clone(&self.store),
            &self.config,
            Arc::clone(&self.engine),
            Arc::clone(&self.cache),
            Arc::clone(&self.prompt_cache),
            Arc::clone(&self.user_locks),
        )?;
        self.wrappers
            .insert(definition.name().to_string(), Arc::new(wrapper));
        Ok(())
    }

    /// Resolve a wrapper from a model name, with or without the provider
    /// prefix.
    pub fn wrapper(&self, model: &str) -> Result<&Arc<AgentLifecycleWrapper>, GateError> {
        let name = model.strip_prefix(MODEL_PREFIX).unwrap_or(model);
        self.wrappers
            .get(name)
            .ok_or_else(|| GateError::UnknownAgent(name.to_string()))
    }

    /// Handle a request end to end.
    pub async fn handle(&self, request: &ChatRequest) -> Result<AgentReply, GateError> {
        self.wrapper(&request.model)?.handle(request).await
    }

    /// Handle a request as a fragment stream.
    pub async fn handle_streaming(
        &self,
        request: &ChatRequest,
    ) -> Result<BoxStream<'static, anyhow::Result<String>>, GateError> {
        self.wrapper(&request.model)?.handle_streaming(request).await
    }
}
