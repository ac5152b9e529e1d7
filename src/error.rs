//! Error taxonomy for the configuration and lifecycle core.
//!
//! The contract callers rely on: "no credential present in the message" is
//! not an error (extraction returns `Ok(None)`), while "credential present
//! but malformed" is `CredentialInvalid` and must be reported back to the
//! user instead of silently re-prompting.

use thiserror::Error;

/// Errors produced by the orchestration core.
#[derive(Debug, Error)]
pub enum GateError {
    /// Extraction found a credential-shaped value that failed validation.
    /// Nothing is stored; the message is surfaced to the user.
    #[error("Invalid credential: {0}")]
    CredentialInvalid(String),

    /// A stored credential was rejected while building the capability
    /// (e.g. an expired token).
    #[error("Failed to build capability '{capability}': {reason}")]
    CapabilityBuild { capability: String, reason: String },

    /// The external system prompt could not be fetched while the feature is
    /// enabled and its prerequisite is configured. Fatal to agent creation,
    /// never silently degraded.
    #[error("Failed to fetch external system prompt: {0}")]
    PromptFetch(String),

    /// A capability's `depends_on` prerequisite is not configured while the
    /// capability's own feature flag is set.
    #[error("Capability '{capability}' requires '{missing}' to be configured first")]
    DependencyUnmet { capability: String, missing: String },

    /// Credential store failure (I/O, SQL).
    #[error("Credential store error: {0}")]
    Store(String),

    /// The request named an agent type that is not registered.
    #[error("Agent '{0}' not found")]
    UnknownAgent(String),

    /// The run engine failed to build or execute an agent.
    #[error("Run engine error: {0}")]
    Engine(String),
}

impl GateError {
    /// Shorthand for a store-layer failure.
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }

    /// Shorthand for a build-time capability failure.
    pub fn build(capability: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::CapabilityBuild {
            capability: capability.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<rusqlite::Error> for GateError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.to_string())
    }
}
