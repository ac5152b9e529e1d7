//! Document store capability (token-based, required).
//!
//! Grants the agent access to an external document store and doubles as the
//! designated fetch capability for the system prompt extension. The actual
//! document transport lives behind [`DocumentBackend`]; the core never
//! speaks HTTP itself.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::{Toolkit, ToolkitCapability};
use crate::credentials::CredentialStore;
use crate::error::GateError;

const KIND: &str = "doc_store";

const MIN_TOKEN_LEN: usize = 16;

/// Transport for fetching document text with a user's access token.
///
/// Implementations raise on auth failure or unknown document; both surface
/// to callers as [`GateError::PromptFetch`] or a capability build error
/// depending on the call site.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn fetch(&self, doc_ref: &str, token: &str) -> Result<String, GateError>;
}

/// Capability granting access to the document store. Required by default;
/// agents that only want documents on explicit request mark it optional.
pub struct DocStoreCapability {
    store: Arc<dyn CredentialStore>,
    backend: Arc<dyn DocumentBackend>,
    server_url: String,
    required: bool,
}

impl DocStoreCapability {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        backend: Arc<dyn DocumentBackend>,
        server_url: String,
    ) -> Self {
        Self {
            store,
            backend,
            server_url,
            required: true,
        }
    }

    /// Mark this capability optional: it only surfaces its prompt when the
    /// user asks about documents.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn extract_token(message: &str) -> Option<String> {
        let patterns = [
            // "my docs token is X", "doc store token is X"
            r"(?i)(?:my\s+)?docs?(?:[ _-]store)?[ _-]token\s+(?:is|=)\s+(\S+)",
            // "docs token: X", "doc store token = X"
            r"(?i)(?:my\s+)?docs?(?:[ _-]store)?[ _-]token\s*[:=]\s*(\S+)",
        ];

        for pattern in patterns {
            let re = Regex::new(pattern).unwrap();
            if let Some(captures) = re.captures(message) {
                return Some(captures[1].to_string());
            }
        }
        None
    }

    async fn stored_token(&self, user_id: &str) -> Result<Option<String>, GateError> {
        let record = self.store.get(KIND, user_id).await?;
        Ok(record.and_then(|r| r.value.get("token").and_then(|v| v.as_str().map(String::from))))
    }

    /// Build the concrete tool handle, typed. Used by the prompt extension
    /// which needs `fetch_document` rather than an opaque toolkit.
    pub async fn build_tools(&self, user_id: &str) -> Result<DocStoreTools, GateError> {
        let token = self
            .stored_token(user_id)
            .await?
            .ok_or_else(|| GateError::build(KIND, "no stored token"))?;

        Ok(DocStoreTools::new(token, Arc::clone(&self.backend)))
    }
}

#[async_trait]
impl ToolkitCapability for DocStoreCapability {
    fn name(&self) -> &str {
        KIND
    }

    fn required(&self) -> bool {
        self.required
    }

    async fn is_configured(&self, user_id: &str) -> Result<bool, GateError> {
        Ok(self.stored_token(user_id).await?.is_some())
    }

    async fn extract_and_store(
        &self,
        message: &str,
        user_id: &str,
    ) -> Result<Option<String>, GateError> {
        let Some(token) = Self::extract_token(message) else {
            return Ok(None);
        };

        if token.len() < MIN_TOKEN_LEN || !token.chars().all(|c| c.is_ascii_graphic()) {
            return Err(GateError::CredentialInvalid(
                "That document store token looks invalid; tokens are at \
                 least 16 printable characters"
                    .to_string(),
            ));
        }

        self.store
            .put(
                KIND,
                user_id,
                serde_json::json!({ "token": token, "server_url": self.server_url }),
            )
            .await?;
        tracing::info!(user_id, server_url = %self.server_url, "Stored document store token");

        Ok(Some(format!(
            "Document store access configured for {}. You can now ask me \
             about your documents.",
            self.server_url
        )))
    }

    async fn check_authorization_request(
        &self,
        message: &str,
        _user_id: &str,
    ) -> Result<bool, GateError> {
        let message_lower = message.to_lowercase();
        let keywords = ["document", "doc store", "docs", "spreadsheet", "slide"];
        Ok(keywords.iter().any(|k| message_lower.contains(k)))
    }

    async fn config_prompt(&self, _user_id: &str) -> Result<Option<String>, GateError> {
        Ok(Some(format!(
            "To use this agent you need document store access. Create an \
             access token at {} and send it here as 'My docs token is \
             YOUR_TOKEN'.",
            self.server_url
        )))
    }

    async fn build(&self, user_id: &str) -> Result<Option<Arc<dyn Toolkit>>, GateError> {
        Ok(Some(Arc::new(self.build_tools(user_id).await?)))
    }

    async fn instructions(&self, user_id: &str) -> Result<Vec<String>, GateError> {
        if self.stored_token(user_id).await?.is_none() {
            return Ok(Vec::new());
        }
        Ok(vec![format!(
            "You have access to document store tools to read documents, \
             sheets and presentations from {}. Use them when the user asks \
             about their documents.",
            self.server_url
        )])
    }
}

/// Document store tool handle bound to one user's token.
pub struct DocStoreTools {
    token: String,
    backend: Arc<dyn DocumentBackend>,
}

impl DocStoreTools {
    pub fn new(token: String, backend: Arc<dyn DocumentBackend>) -> Self {
        Self { token, backend }
    }

    /// Fetch a document's text content.
    pub async fn fetch_document(&self, doc_ref: &str) -> Result<String, GateError> {
        let content = self.backend.fetch(doc_ref, &self.token).await?;
        if content.is_empty() {
            return Err(GateError::PromptFetch(format!(
                "Document '{doc_ref}' is empty or inaccessible"
            )));
        }
        Ok(content)
    }
}

impl Toolkit for DocStoreTools {
    fn name(&self) -> &str {
        "doc_store_tools"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::InMemoryCredentialStore;
    use crate::testutil::StaticBackend;

    fn capability(backend: StaticBackend) -> DocStoreCapability {
        DocStoreCapability::new(
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(backend),
            "https://docs.example.com".to_string(),
        )
    }

    #[test]
    fn extracts_token_phrasings() {
        for message in [
            "my docs token is 0123456789abcdef",
            "doc store token: 0123456789abcdef",
            "docs token = 0123456789abcdef",
        ] {
            assert_eq!(
                DocStoreCapability::extract_token(message).as_deref(),
                Some("0123456789abcdef"),
                "failed on {message:?}"
            );
        }
    }

    #[tokio::test]
    async fn stores_token_then_fetches_document() {
        let cap = capability(StaticBackend::with_document("doc-1", "release notes"));
        cap.extract_and_store("my docs token is 0123456789abcdef", "u1")
            .await
            .unwrap()
            .unwrap();

        let tools = cap.build_tools("u1").await.unwrap();
        assert_eq!(tools.fetch_document("doc-1").await.unwrap(), "release notes");
    }

    #[tokio::test]
    async fn fetch_unknown_document_fails() {
        let cap = capability(StaticBackend::with_document("doc-1", "x"));
        cap.extract_and_store("my docs token is 0123456789abcdef", "u1")
            .await
            .unwrap();

        let tools = cap.build_tools("u1").await.unwrap();
        let err = tools.fetch_document("doc-missing").await.unwrap_err();
        assert!(matches!(err, GateError::PromptFetch(_)));
    }

    #[tokio::test]
    async fn build_without_token_is_a_build_error() {
        let cap = capability(StaticBackend::with_document("doc-1", "x"));
        let err = cap.build("u1").await.unwrap_err();
        assert!(matches!(err, GateError::CapabilityBuild { .. }));
    }

    #[tokio::test]
    async fn malformed_token_is_invalid() {
        let cap = capability(StaticBackend::with_document("doc-1", "x"));
        let err = cap
            .extract_and_store("my docs token is short", "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::CredentialInvalid(_)));
    }
}
