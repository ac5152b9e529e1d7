//! Toolkit capabilities and the per-agent capability registry.
//!
//! A capability is a user-unlockable unit of agent functionality. The
//! capability object itself is stateless; configuration state lives in the
//! [`CredentialStore`](crate::credentials::CredentialStore), keyed by
//! `(capability name, user_id)`, so every method here binds to a `user_id`
//! at call time.
//!
//! Registration order encodes dependency: a capability that reads another
//! capability's configured state must be registered after it. The registry
//! enforces this at construction instead of relying on a comment.

mod color;
mod doc_store;
mod issue_tracker;
mod prompt_extension;

pub use color::{ColorTools, FavoriteColorCapability};
pub use doc_store::{DocStoreCapability, DocStoreTools, DocumentBackend};
pub use issue_tracker::{IssueTrackerCapability, IssueTrackerTools};
pub use prompt_extension::PromptExtensionCapability;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::GateError;

/// A built tool handle handed to the run engine.
///
/// Handles are opaque to the orchestration core; the run engine decides how
/// to expose them to the model.
pub trait Toolkit: Send + Sync {
    /// Stable name for logging and engine-side registration.
    fn name(&self) -> &str;
}

impl std::fmt::Debug for dyn Toolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolkit").field("name", &self.name()).finish()
    }
}

/// Contract every toolkit capability implements.
///
/// # Invariants
/// - `is_configured` is a pure read of the credential store; it never
///   mutates and never performs network I/O beyond the store itself.
/// - `extract_and_store` is idempotent: re-extracting the same message
///   yields the same stored state.
/// - Presence of a valid record for `(name, user_id)` in the store is
///   equivalent to `is_configured(user_id)` returning `true`.
#[async_trait]
pub trait ToolkitCapability: Send + Sync {
    /// Unique name within a registry; doubles as the credential kind.
    fn name(&self) -> &str;

    /// Required capabilities block agent creation until configured;
    /// optional capabilities stay silent until the user asks for them.
    fn required(&self) -> bool {
        true
    }

    /// Names of capabilities this one reads configured state from.
    /// All of them must be registered earlier in the registry.
    fn depends_on(&self) -> &[&str] {
        &[]
    }

    /// Whether the user has a valid stored configuration.
    async fn is_configured(&self, user_id: &str) -> Result<bool, GateError>;

    /// Scan one user message for this capability's credential pattern.
    ///
    /// Returns `Ok(Some(confirmation))` when a credential was found,
    /// validated and stored; `Ok(None)` when the message contains no
    /// credential for this capability;
    /// `Err(GateError::CredentialInvalid)` when a credential-shaped value
    /// was present but malformed (nothing is stored).
    async fn extract_and_store(
        &self,
        message: &str,
        user_id: &str,
    ) -> Result<Option<String>, GateError>;

    /// Detect that the user is asking to use this capability's feature,
    /// whether or not credentials were supplied. Only consulted for
    /// optional capabilities.
    async fn check_authorization_request(
        &self,
        _message: &str,
        _user_id: &str,
    ) -> Result<bool, GateError> {
        Ok(false)
    }

    /// Human-readable instructions for supplying credentials. Safe to show
    /// repeatedly; never leaks stored secrets. `None` means this capability
    /// never prompts (it is silently skipped while unconfigured).
    async fn config_prompt(&self, user_id: &str) -> Result<Option<String>, GateError>;

    /// Construct the concrete tool handle from stored credentials.
    ///
    /// Returns `Ok(None)` for capabilities that contribute instructions
    /// only. Fails with `CapabilityBuild` when the stored credential is
    /// rejected, or `DependencyUnmet` when a `depends_on` prerequisite is
    /// not configured.
    async fn build(&self, user_id: &str) -> Result<Option<Arc<dyn Toolkit>>, GateError>;

    /// Capability-specific additions to the agent's instruction set.
    /// Only called while `is_configured` is true.
    async fn instructions(&self, _user_id: &str) -> Result<Vec<String>, GateError> {
        Ok(Vec::new())
    }
}

/// Errors detected while assembling a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate capability name '{0}'")]
    DuplicateName(String),

    #[error("Capability '{capability}' depends on unregistered capability '{dependency}'")]
    UnknownDependency {
        capability: String,
        dependency: String,
    },

    #[error(
        "Capability '{capability}' must be registered after its dependency '{dependency}'"
    )]
    DependencyOrder {
        capability: String,
        dependency: String,
    },
}

/// Ordered list of capabilities for one agent type.
///
/// Iteration order is registration order everywhere: extraction, readiness
/// checks, builds and instruction composition all walk it front to back.
pub struct CapabilityRegistry {
    capabilities: Vec<Arc<dyn ToolkitCapability>>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field(
                "capabilities",
                &self
                    .capabilities
                    .iter()
                    .map(|c| c.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl CapabilityRegistry {
    /// Validate and wrap an ordered capability list.
    pub fn new(capabilities: Vec<Arc<dyn ToolkitCapability>>) -> Result<Self, RegistryError> {
        let mut seen: Vec<&str> = Vec::with_capacity(capabilities.len());

        for capability in &capabilities {
            let name = capability.name();
            if seen.contains(&name) {
                return Err(RegistryError::DuplicateName(name.to_string()));
            }

            for dependency in capability.depends_on() {
                if seen.contains(dependency) {
                    continue;
                }
                let registered_later = capabilities.iter().any(|c| c.name() == *dependency);
                if registered_later {
                    return Err(RegistryError::DependencyOrder {
                        capability: name.to_string(),
                        dependency: dependency.to_string(),
                    });
                }
                return Err(RegistryError::UnknownDependency {
                    capability: name.to_string(),
                    dependency: dependency.to_string(),
                });
            }

            seen.push(name);
        }

        Ok(Self { capabilities })
    }

    /// Capabilities in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolkitCapability>> {
        self.capabilities.iter()
    }

    /// Look up a capability by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolkitCapability>> {
        self.capabilities.iter().find(|c| c.name() == name)
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeCapability {
        name: &'static str,
        depends_on: Vec<&'static str>,
    }

    #[async_trait]
    impl ToolkitCapability for FakeCapability {
        fn name(&self) -> &str {
            self.name
        }

        fn depends_on(&self) -> &[&str] {
            &self.depends_on
        }

        async fn is_configured(&self, _user_id: &str) -> Result<bool, GateError> {
            Ok(false)
        }

        async fn extract_and_store(
            &self,
            _message: &str,
            _user_id: &str,
        ) -> Result<Option<String>, GateError> {
            Ok(None)
        }

        async fn config_prompt(&self, _user_id: &str) -> Result<Option<String>, GateError> {
            Ok(None)
        }

        async fn build(&self, _user_id: &str) -> Result<Option<Arc<dyn Toolkit>>, GateError> {
            Ok(None)
        }
    }

    fn cap(name: &'static str, depends_on: Vec<&'static str>) -> Arc<dyn ToolkitCapability> {
        Arc::new(FakeCapability { name, depends_on })
    }

    #[test]
    fn accepts_ordered_dependencies() {
        let registry =
            CapabilityRegistry::new(vec![cap("a", vec![]), cap("b", vec!["a"])]).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("b").is_some());
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = CapabilityRegistry::new(vec![cap("a", vec![]), cap("a", vec![])]).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(name) if name == "a"));
    }

    #[test]
    fn rejects_forward_dependency() {
        let err =
            CapabilityRegistry::new(vec![cap("b", vec!["a"]), cap("a", vec![])]).unwrap_err();
        assert!(matches!(err, RegistryError::DependencyOrder { .. }));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let err = CapabilityRegistry::new(vec![cap("b", vec!["missing"])]).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownDependency { .. }));
    }
}
