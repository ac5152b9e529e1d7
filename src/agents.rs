//! Agent definitions.
//!
//! A definition is the static description of one agent type: its name, its
//! built-in instructions and the ordered capability set users configure.
//! The lifecycle wrapper turns a definition into a running, cached agent
//! per user.

use std::sync::Arc;

use crate::config::GateConfig;
use crate::credentials::CredentialStore;
use crate::toolkit::{
    CapabilityRegistry, DocStoreCapability, DocumentBackend, FavoriteColorCapability,
    IssueTrackerCapability, PromptExtensionCapability, RegistryError, ToolkitCapability,
};

/// A definition's capability set plus its designated prompt-extension
/// capability, when it has one.
pub struct AgentToolchain {
    pub registry: CapabilityRegistry,
    pub prompt_extension: Option<Arc<PromptExtensionCapability>>,
}

/// Static description of one agent type.
pub trait AgentDefinition: Send + Sync {
    /// Agent name; also the model name the transport routes on.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Model identifier handed to the run engine.
    fn model_id(&self, config: &GateConfig) -> String {
        config.default_model.clone()
    }

    /// Built-in base instructions, static and never user-specific.
    fn base_instructions(&self) -> Vec<String>;

    /// Assemble the ordered capability set for this agent.
    ///
    /// Registration order encodes dependency; the registry validates it.
    fn build_toolchain(
        &self,
        store: Arc<dyn CredentialStore>,
        config: &GateConfig,
    ) -> Result<AgentToolchain, RegistryError>;
}

/// Minimal agent exercising the required-configuration flow end to end
/// with a single capability and no external services.
pub struct DemoAgentDefinition;

impl AgentDefinition for DemoAgentDefinition {
    fn name(&self) -> &str {
        "demo"
    }

    fn description(&self) -> &str {
        "Interactive walkthrough of the configuration flow"
    }

    fn base_instructions(&self) -> Vec<String> {
        vec![
            "You are the demo agent, an interactive walkthrough of the \
             platform's configuration flow."
                .to_string(),
            "Guide the user through configuring a favorite color, then \
             demonstrate the color tools."
                .to_string(),
            "Use the color tools to generate palettes when asked and \
             include the palette entries in your reply."
                .to_string(),
            "Be concise and use markdown formatting.".to_string(),
        ]
    }

    fn build_toolchain(
        &self,
        store: Arc<dyn CredentialStore>,
        _config: &GateConfig,
    ) -> Result<AgentToolchain, RegistryError> {
        let registry = CapabilityRegistry::new(vec![
            Arc::new(FavoriteColorCapability::new(store)) as Arc<dyn ToolkitCapability>,
        ])?;

        Ok(AgentToolchain {
            registry,
            prompt_extension: None,
        })
    }
}

/// Release coordination agent: document store plus issue tracker, with the
/// externally maintained system prompt layered on top.
pub struct ReleaseDeskDefinition {
    backend: Arc<dyn DocumentBackend>,
}

impl ReleaseDeskDefinition {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self { backend }
    }
}

impl AgentDefinition for ReleaseDeskDefinition {
    fn name(&self) -> &str {
        "release-desk"
    }

    fn description(&self) -> &str {
        "Release tracking and coordination assistant"
    }

    fn base_instructions(&self) -> Vec<String> {
        vec![
            "You are the release desk assistant for the engineering \
             organization."
                .to_string(),
            "Track release progress, risks and blockers across major and \
             maintenance releases."
                .to_string(),
            "Use the issue tracker tools for issues, epics and bugs; use \
             the document store tools for schedules and test plans."
                .to_string(),
            "Prefer tables and bullet points, and link the issues and \
             documents you reference."
                .to_string(),
        ]
    }

    fn build_toolchain(
        &self,
        store: Arc<dyn CredentialStore>,
        config: &GateConfig,
    ) -> Result<AgentToolchain, RegistryError> {
        // Order matters: the prompt extension reads the doc store's
        // configured state, so the doc store registers first.
        let doc_store = Arc::new(DocStoreCapability::new(
            Arc::clone(&store),
            Arc::clone(&self.backend),
            config.doc_store_url.clone(),
        ));
        let issue_tracker = Arc::new(IssueTrackerCapability::new(
            Arc::clone(&store),
            config.issue_tracker_url.clone(),
        ));
        let prompt_extension = Arc::new(PromptExtensionCapability::new(
            Arc::clone(&doc_store),
            config.system_prompt_doc_ref.clone(),
        ));

        let registry = CapabilityRegistry::new(vec![
            doc_store as Arc<dyn ToolkitCapability>,
            issue_tracker as Arc<dyn ToolkitCapability>,
            Arc::clone(&prompt_extension) as Arc<dyn ToolkitCapability>,
        ])?;

        Ok(AgentToolchain {
            registry,
            prompt_extension: Some(prompt_extension),
        })
    }
}
