//! Configuration for the orchestration core.
//!
//! Configuration is read from environment variables once at process start
//! and injected into the components that need it; nothing re-reads the
//! environment per request.
//!
//! - `AGENTGATE_CREDENTIALS_DB` - Optional. Path to the SQLite credential
//!   database. Defaults to `./credentials.db`.
//! - `AGENTGATE_SYSTEM_PROMPT_DOC` - Optional. Document reference for the
//!   external system prompt extension. When unset the extension is disabled
//!   and stays silent.
//! - `AGENTGATE_ISSUE_TRACKER_URL` - Optional. Issue tracker server URL.
//!   Defaults to `https://issues.example.com`.
//! - `AGENTGATE_DOC_STORE_URL` - Optional. Document store server URL.
//!   Defaults to `https://docs.example.com`.
//! - `AGENTGATE_DEFAULT_MODEL` - Optional. Model identifier handed to the
//!   run engine. Defaults to `gemini-2.5-flash`.

use std::path::PathBuf;

/// Core configuration.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Path to the SQLite credential database
    pub credentials_db_path: PathBuf,

    /// Document reference for the external system prompt extension.
    /// `None` disables the feature entirely.
    pub system_prompt_doc_ref: Option<String>,

    /// Issue tracker server URL
    pub issue_tracker_url: String,

    /// Document store server URL
    pub doc_store_url: String,

    /// Default model identifier for the run engine
    pub default_model: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            credentials_db_path: PathBuf::from("./credentials.db"),
            system_prompt_doc_ref: None,
            issue_tracker_url: "https://issues.example.com".to_string(),
            doc_store_url: "https://docs.example.com".to_string(),
            default_model: "gemini-2.5-flash".to_string(),
        }
    }
}

impl GateConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            credentials_db_path: std::env::var("AGENTGATE_CREDENTIALS_DB")
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_db_path),
            system_prompt_doc_ref: std::env::var("AGENTGATE_SYSTEM_PROMPT_DOC")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            issue_tracker_url: std::env::var("AGENTGATE_ISSUE_TRACKER_URL")
                .unwrap_or(defaults.issue_tracker_url),
            doc_store_url: std::env::var("AGENTGATE_DOC_STORE_URL")
                .unwrap_or(defaults.doc_store_url),
            default_model: std::env::var("AGENTGATE_DEFAULT_MODEL")
                .unwrap_or(defaults.default_model),
        }
    }

    /// Check if the external system prompt feature is enabled.
    pub fn system_prompt_enabled(&self) -> bool {
        self.system_prompt_doc_ref.is_some()
    }
}
