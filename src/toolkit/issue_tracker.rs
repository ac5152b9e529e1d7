//! Issue tracker capability (token-based, optional).
//!
//! Users unlock it by pasting a personal API token into the chat. The token
//! is validated syntactically here; actual connectivity checks belong to
//! the tracker client behind the toolkit and are out of scope for the core.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::{Toolkit, ToolkitCapability};
use crate::credentials::CredentialStore;
use crate::error::GateError;

const KIND: &str = "issue_tracker";

/// Minimum plausible token length; anything shorter is treated as malformed
/// rather than silently ignored once a token pattern matched.
const MIN_TOKEN_LEN: usize = 16;

/// Optional capability granting access to an issue tracker.
pub struct IssueTrackerCapability {
    store: Arc<dyn CredentialStore>,
    server_url: String,
}

impl IssueTrackerCapability {
    pub fn new(store: Arc<dyn CredentialStore>, server_url: String) -> Self {
        Self { store, server_url }
    }

    /// Extract a tracker token from the message, if any.
    ///
    /// Supports explicit phrasings ("my tracker token is X", "tracker
    /// token: X") and standalone 30+ character alphanumeric tokens.
    fn extract_token(message: &str) -> Option<String> {
        let patterns = [
            r"(?i)(?:my\s+)?tracker[ _-]token\s+(?:is|=|:)\s+(\S+)",
            r"(?i)set\s+tracker[ _-]token\s+to\s+(\S+)",
            r"(?i)tracker[ _-]token:\s*(\S+)",
        ];

        for pattern in patterns {
            let re = Regex::new(pattern).unwrap();
            if let Some(captures) = re.captures(message) {
                return Some(captures[1].to_string());
            }
        }

        // Standalone long tokens: 30+ chars, must mix letters and digits so
        // ordinary words never match.
        let standalone = Regex::new(r"(?:^|\s)([A-Za-z0-9+/=]{30,})(?:\s|$)").unwrap();
        if let Some(captures) = standalone.captures(message) {
            let candidate = &captures[1];
            let has_letters = candidate.chars().any(|c| c.is_ascii_alphabetic());
            let has_digits = candidate.chars().any(|c| c.is_ascii_digit());
            if has_letters && has_digits {
                return Some(candidate.to_string());
            }
        }

        None
    }

    fn validate_token(token: &str) -> Result<(), GateError> {
        if token.len() < MIN_TOKEN_LEN {
            return Err(GateError::CredentialInvalid(format!(
                "That tracker token looks too short ({} characters); \
                 tokens are at least {} characters",
                token.len(),
                MIN_TOKEN_LEN
            )));
        }
        if !token.chars().all(|c| c.is_ascii_graphic()) {
            return Err(GateError::CredentialInvalid(
                "That tracker token contains unexpected characters".to_string(),
            ));
        }
        Ok(())
    }

    async fn stored_token(&self, user_id: &str) -> Result<Option<String>, GateError> {
        let record = self.store.get(KIND, user_id).await?;
        Ok(record.and_then(|r| r.value.get("token").and_then(|v| v.as_str().map(String::from))))
    }
}

#[async_trait]
impl ToolkitCapability for IssueTrackerCapability {
    fn name(&self) -> &str {
        KIND
    }

    fn required(&self) -> bool {
        false
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

        Self::validate_token(&token)?;

        self.store
            .put(
                KIND,
                user_id,
                serde_json::json!({ "token": token, "server_url": self.server_url }),
            )
            .await?;
        tracing::info!(user_id, server_url = %self.server_url, "Stored issue tracker token");

        Ok(Some(format!(
            "Issue tracker configured for {}. You can now ask me to search \
             for issues or look up issue details.",
            self.server_url
        )))
    }

    async fn check_authorization_request(
        &self,
        message: &str,
        _user_id: &str,
    ) -> Result<bool, GateError> {
        let message_lower = message.to_lowercase();
        let keywords = ["issue", "ticket", "tracker", "sprint", "backlog"];
        Ok(keywords.iter().any(|k| message_lower.contains(k)))
    }

    async fn config_prompt(&self, _user_id: &str) -> Result<Option<String>, GateError> {
        Ok(Some(format!(
            "To access the issue tracker, provide your API token by saying \
             'My tracker token is YOUR_TOKEN'. You can create one at {} \
             under account settings > security > API tokens.",
            self.server_url
        )))
    }

    async fn build(&self, user_id: &str) -> Result<Option<Arc<dyn Toolkit>>, GateError> {
        let token = self
            .stored_token(user_id)
            .await?
            .ok_or_else(|| GateError::build(KIND, "no stored token"))?;

        Ok(Some(Arc::new(IssueTrackerTools::new(
            token,
            self.server_url.clone(),
        ))))
    }

    async fn instructions(&self, user_id: &str) -> Result<Vec<String>, GateError> {
        if self.stored_token(user_id).await?.is_none() {
            return Ok(Vec::new());
        }
        Ok(vec![format!(
            "You have access to issue tracker tools to search issues and \
             get issue details from {}. Use them when the user asks about \
             issues or tickets.",
            self.server_url
        )])
    }
}

/// Issue tracker tool handle bound to one user's token.
pub struct IssueTrackerTools {
    token: String,
    server_url: String,
}

impl IssueTrackerTools {
    pub fn new(token: String, server_url: String) -> Self {
        Self { token, server_url }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Token accessor for the tracker client behind the run engine.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Toolkit for IssueTrackerTools {
    fn name(&self) -> &str {
        "issue_tracker_tools"
    }
}
