//! Instruction composition and the external prompt cache.
//!
//! The composed instruction list has a fixed shape: built-in base
//! instructions, then the externally fetched system prompt (when the
//! feature is enabled), then each configured capability's contribution in
//! registration order. It is composed once per agent build and handed to
//! the run engine whole.
//!
//! The external prompt is fetched at most once per user per invalidation
//! cycle. The cache deliberately has no TTL: its epoch boundary is the same
//! invalidation event as the agent cache, so prompt cache lifetime is a
//! subset of agent cache lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::GateError;
use crate::toolkit::{CapabilityRegistry, PromptExtensionCapability};

/// A fetched external prompt with its fetch time.
#[derive(Debug, Clone)]
pub struct CachedPrompt {
    pub text: String,
    pub fetched_at: DateTime<Utc>,
}

/// Per-user cache of fetched external prompts.
///
/// Absence of an entry means "not yet fetched for this user".
#[derive(Default)]
pub struct ExternalPromptCache {
    entries: RwLock<HashMap<String, CachedPrompt>>,
}

impl ExternalPromptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, user_id: &str) -> Option<CachedPrompt> {
        self.entries.read().await.get(user_id).cloned()
    }

    pub async fn put(&self, user_id: &str, text: String) {
        let mut entries = self.entries.write().await;
        entries.insert(
            user_id.to_string(),
            CachedPrompt {
                text,
                fetched_at: Utc::now(),
            },
        );
    }

    /// Drop the entry for `user_id`. Called on every agent cache
    /// invalidation for that user.
    pub async fn invalidate(&self, user_id: &str) {
        if self.entries.write().await.remove(user_id).is_some() {
            tracing::info!(user_id, "Invalidated cached external prompt");
        }
    }
}

/// Builds the final instruction list for an agent build.
pub struct PromptComposer {
    base: Vec<String>,
    extension: Option<Arc<PromptExtensionCapability>>,
    cache: Arc<ExternalPromptCache>,
    registry: Arc<CapabilityRegistry>,
}

impl PromptComposer {
    pub fn new(
        base: Vec<String>,
        extension: Option<Arc<PromptExtensionCapability>>,
        cache: Arc<ExternalPromptCache>,
        registry: Arc<CapabilityRegistry>,
    ) -> Self {
        Self {
            base,
            extension,
            cache,
            registry,
        }
    }

    /// Compose the full instruction list for `user_id`.
    ///
    /// Fails with `DependencyUnmet` when the external prompt feature is
    /// enabled but its prerequisite is unconfigured, and with `PromptFetch`
    /// when the fetch itself fails; an entirely unconfigured feature is
    /// simply omitted.
    pub async fn compose(&self, user_id: &str) -> Result<Vec<String>, GateError> {
        let mut instructions = self.base.clone();

        if let Some(section) = self.external_section(user_id).await? {
            instructions.push(String::new());
            instructions.extend(section);
        }

        for capability in self.registry.iter() {
            if !capability.is_configured(user_id).await? {
                continue;
            }
            let extra = capability.instructions(user_id).await?;
            if !extra.is_empty() {
                instructions.push(String::new());
                instructions.extend(extra);
            }
        }

        tracing::debug!(user_id, lines = instructions.len(), "Composed instructions");
        Ok(instructions)
    }

    /// The external prompt section, fetched lazily and cached per user.
    async fn external_section(&self, user_id: &str) -> Result<Option<Vec<String>>, GateError> {
        let Some(extension) = &self.extension else {
            return Ok(None);
        };
        let Some(doc_ref) = extension.doc_ref() else {
            // Feature disabled; omit the section entirely.
            return Ok(None);
        };

        let text = match self.cache.get(user_id).await {
            Some(entry) => {
                tracing::debug!(user_id, "Using cached external prompt");
                entry.text
            }
            None => {
                let text = extension.fetch_prompt(user_id).await?;
                self.cache.put(user_id, text.clone()).await;
                text
            }
        };

        Ok(Some(vec![
            format!("=== Extended system prompt (source: {doc_ref}) ==="),
            text,
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CredentialStore, InMemoryCredentialStore};
    use crate::testutil::StaticBackend;
    use crate::toolkit::{DocStoreCapability, FavoriteColorCapability, ToolkitCapability};

    fn base() -> Vec<String> {
        vec!["You are a test agent.".to_string()]
    }

    #[tokio::test]
    async fn base_only_when_nothing_configured() {
        let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
        let registry = Arc::new(
            CapabilityRegistry::new(vec![
                Arc::new(FavoriteColorCapability::new(store)) as Arc<dyn ToolkitCapability>
            ])
            .unwrap(),
        );
        let composer = PromptComposer::new(
            base(),
            None,
            Arc::new(ExternalPromptCache::new()),
            registry,
        );

        assert_eq!(composer.compose("u1").await.unwrap(), base());
    }

    #[tokio::test]
    async fn configured_capability_contributions_follow_base() {
        let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
        let color = Arc::new(FavoriteColorCapability::new(Arc::clone(&store)));
        color
            .extract_and_store("my favorite color is blue", "u1")
            .await
            .unwrap();

        let registry = Arc::new(
            CapabilityRegistry::new(vec![color as Arc<dyn ToolkitCapability>]).unwrap(),
        );
        let composer = PromptComposer::new(
            base(),
            None,
            Arc::new(ExternalPromptCache::new()),
            registry,
        );

        let instructions = composer.compose("u1").await.unwrap();
        assert_eq!(instructions[0], "You are a test agent.");
        assert_eq!(instructions[1], "");
        assert!(instructions[2].contains("blue"));
    }

    #[tokio::test]
    async fn external_prompt_is_fetched_once_and_cached() {
        let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
        let doc_store = Arc::new(DocStoreCapability::new(
            Arc::clone(&store),
            Arc::new(StaticBackend::with_document("doc", "extended")),
            "https://docs.example.com".to_string(),
        ));
        doc_store
            .extract_and_store("my docs token is 0123456789abcdef", "u1")
            .await
            .unwrap();

        let extension = Arc::new(PromptExtensionCapability::new(
            Arc::clone(&doc_store),
            Some("doc".to_string()),
        ));
        let cache = Arc::new(ExternalPromptCache::new());
        let registry = Arc::new(
            CapabilityRegistry::new(vec![doc_store as Arc<dyn ToolkitCapability>]).unwrap(),
        );
        let composer = PromptComposer::new(base(), Some(extension), Arc::clone(&cache), registry);

        let first = composer.compose("u1").await.unwrap();
        assert!(first.iter().any(|l| l == "extended"));

        let cached = cache.get("u1").await.unwrap();
        assert_eq!(cached.text, "extended");

        // Second compose reuses the cache entry rather than refetching;
        // verify by poisoning the cache and seeing the poisoned value.
        cache.put("u1", "from-cache".to_string()).await;
        let second = composer.compose("u1").await.unwrap();
        assert!(second.iter().any(|l| l == "from-cache"));
    }

    #[tokio::test]
    async fn unmet_prerequisite_fails_composition() {
        let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
        let doc_store = Arc::new(DocStoreCapability::new(
            Arc::clone(&store),
            Arc::new(StaticBackend::with_document("doc", "extended")),
            "https://docs.example.com".to_string(),
        ));
        let extension = Arc::new(PromptExtensionCapability::new(
            Arc::clone(&doc_store),
            Some("doc".to_string()),
        ));
        let registry = Arc::new(
            CapabilityRegistry::new(vec![doc_store as Arc<dyn ToolkitCapability>]).unwrap(),
        );
        let composer = PromptComposer::new(
            base(),
            Some(extension),
            Arc::new(ExternalPromptCache::new()),
            registry,
        );

        let err = composer.compose("u1").await.unwrap_err();
        assert!(matches!(err, GateError::DependencyUnmet { .. }));
    }
}
