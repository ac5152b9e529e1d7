//! System prompt extension capability.
//!
//! Extends the agent's instruction set with a document fetched from the
//! document store. Configuration comes from the environment (the document
//! reference) and from the document store credential, never from chat
//! messages, so the capability is silent: it has no extraction, no prompt
//! and no tool handle.
//!
//! Policy, deliberately asymmetric: when the document reference is unset
//! the capability is a no-op; when it is set but the prerequisite document
//! store is unconfigured, agent creation fails with `DependencyUnmet`; when
//! both are set and the fetch fails, agent creation fails with
//! `PromptFetch`. Failures are never degraded into a silently shorter
//! prompt.

use std::sync::Arc;

use async_trait::async_trait;

use super::{DocStoreCapability, Toolkit, ToolkitCapability};
use crate::error::GateError;

const KIND: &str = "system_prompt_extension";

const DEPENDS_ON: &[&str] = &["doc_store"];

/// Required, dependent capability fetching the external system prompt.
pub struct PromptExtensionCapability {
    doc_store: Arc<DocStoreCapability>,
    doc_ref: Option<String>,
}

impl PromptExtensionCapability {
    pub fn new(doc_store: Arc<DocStoreCapability>, doc_ref: Option<String>) -> Self {
        if let Some(doc_ref) = &doc_ref {
            tracing::info!(doc_ref = %doc_ref, "System prompt extension enabled");
        } else {
            tracing::debug!("System prompt extension disabled (no document reference)");
        }
        Self { doc_store, doc_ref }
    }

    /// The configured document reference, if the feature is enabled.
    pub fn doc_ref(&self) -> Option<&str> {
        self.doc_ref.as_deref()
    }

    /// Fetch the extended system prompt for a user.
    ///
    /// Callers cache the result; this performs the fetch every time.
    pub async fn fetch_prompt(&self, user_id: &str) -> Result<String, GateError> {
        let Some(doc_ref) = &self.doc_ref else {
            return Err(GateError::PromptFetch(
                "system prompt document reference not configured".to_string(),
            ));
        };

        if !self.doc_store.is_configured(user_id).await? {
            return Err(GateError::DependencyUnmet {
                capability: KIND.to_string(),
                missing: "doc_store".to_string(),
            });
        }

        let tools = self.doc_store.build_tools(user_id).await?;
        let text = tools
            .fetch_document(doc_ref)
            .await
            .map_err(|e| GateError::PromptFetch(e.to_string()))?;

        tracing::info!(user_id, doc_ref = %doc_ref, chars = text.len(),
            "Fetched extended system prompt");
        Ok(text)
    }
}

#[async_trait]
impl ToolkitCapability for PromptExtensionCapability {
    fn name(&self) -> &str {
        KIND
    }

    fn depends_on(&self) -> &[&str] {
        DEPENDS_ON
    }

    async fn is_configured(&self, user_id: &str) -> Result<bool, GateError> {
        if self.doc_ref.is_none() {
            return Ok(false);
        }
        self.doc_store.is_configured(user_id).await
    }

    async fn extract_and_store(
        &self,
        _message: &str,
        _user_id: &str,
    ) -> Result<Option<String>, GateError> {
        // Nothing extractable; configuration comes from the environment and
        // the document store credential.
        Ok(None)
    }

    async fn config_prompt(&self, _user_id: &str) -> Result<Option<String>, GateError> {
        // Silent: the document store prompts for its own credential.
        Ok(None)
    }

    async fn build(&self, _user_id: &str) -> Result<Option<Arc<dyn Toolkit>>, GateError> {
        // Contributes instructions only, via the prompt composer.
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::InMemoryCredentialStore;
    use crate::testutil::StaticBackend;

    fn doc_store(backend: StaticBackend) -> Arc<DocStoreCapability> {
        Arc::new(DocStoreCapability::new(
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(backend),
            "https://docs.example.com".to_string(),
        ))
    }

    #[tokio::test]
    async fn disabled_extension_is_unconfigured_and_silent() {
        let store = doc_store(StaticBackend::with_document("d", "x"));
        let ext = PromptExtensionCapability::new(store, None);

        assert!(!ext.is_configured("u1").await.unwrap());
        assert!(ext.config_prompt("u1").await.unwrap().is_none());
        assert!(ext.build("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enabled_without_prerequisite_is_dependency_unmet() {
        let store = doc_store(StaticBackend::with_document("d", "x"));
        let ext = PromptExtensionCapability::new(store, Some("d".to_string()));

        assert!(!ext.is_configured("u1").await.unwrap());
        let err = ext.fetch_prompt("u1").await.unwrap_err();
        assert!(matches!(err, GateError::DependencyUnmet { .. }));
    }

    #[tokio::test]
    async fn enabled_with_prerequisite_fetches_document() {
        let store = doc_store(StaticBackend::with_document("d", "extended prompt"));
        store
            .extract_and_store("my docs token is 0123456789abcdef", "u1")
            .await
            .unwrap();

        let ext = PromptExtensionCapability::new(store, Some("d".to_string()));
        assert!(ext.is_configured("u1").await.unwrap());
        assert_eq!(ext.fetch_prompt("u1").await.unwrap(), "extended prompt");
    }

    #[tokio::test]
    async fn fetch_failure_is_prompt_fetch_error() {
        let store = doc_store(StaticBackend::with_document("other", "x"));
        store
            .extract_and_store("my docs token is 0123456789abcdef", "u1")
            .await
            .unwrap();

        let ext = PromptExtensionCapability::new(store, Some("missing".to_string()));
        let err = ext.fetch_prompt("u1").await.unwrap_err();
        assert!(matches!(err, GateError::PromptFetch(_)));
    }
}
