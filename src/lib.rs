//! # agentgate
//!
//! Per-user configuration and lifecycle orchestration for chat-backed
//! agents. A chat-completion proxy hands this crate `(messages, user,
//! model parameters)` tuples; the crate decides whether the turn is
//! answered with a configuration prompt or by a built, cached agent.
//!
//! ## Architecture
//!
//! ```text
//!  request ──▶ AgentService ──▶ AgentLifecycleWrapper
//!                                       │
//!                    ┌──────────────────┼──────────────────┐
//!                    ▼                  ▼                  ▼
//!        ConfigurationOrchestrator  PromptComposer     AgentCache
//!          (credential extraction,  (base + external   (fingerprint-keyed,
//!           readiness, cache         + per-capability   deduplicated
//!           invalidation)            instructions)      builds)
//!                    │                  │                  │
//!                    ▼                  ▼                  ▼
//!            CredentialStore    ExternalPromptCache    RunEngine
//! ```
//!
//! ## Request Flow
//! 1. The orchestrator walks the agent's capability registry against the
//!    latest user message: extract credentials, invalidate caches on
//!    change, decide readiness
//! 2. Not ready: the capability's configuration prompt is the whole reply
//! 3. Ready: the agent cache returns or builds the agent for this
//!    request's fingerprint, and execution is delegated to the run engine
//!
//! ## Modules
//! - `agents`: agent definitions (capability sets + base instructions)
//! - `toolkit`: the capability contract and concrete capabilities
//! - `orchestrator`: the per-turn configuration state machine
//! - `cache` / `prompt`: built-agent cache and external prompt cache
//! - `wrapper`: the public entry point

pub mod agents;
pub mod cache;
pub mod chat;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod prompt;
pub mod toolkit;
pub mod wrapper;

#[cfg(test)]
pub(crate) mod testutil;

pub use agents::{AgentDefinition, AgentToolchain, DemoAgentDefinition, ReleaseDeskDefinition};
pub use cache::{AgentCache, Fingerprint};
pub use chat::{AgentReply, ChatMessage, ChatRequest, Role};
pub use config::GateConfig;
pub use credentials::{CredentialStore, InMemoryCredentialStore, SqliteCredentialStore};
pub use engine::{AgentBlueprint, ModelParams, RunEngine, RunnableAgent};
pub use error::GateError;
pub use orchestrator::{ConfigOutcome, ConfigurationOrchestrator};
pub use prompt::{ExternalPromptCache, PromptComposer};
pub use toolkit::{CapabilityRegistry, RegistryError, Toolkit, ToolkitCapability};
pub use wrapper::{AgentLifecycleWrapper, AgentService, UserLocks};
