//! Chat-level request and reply types.
//!
//! The transport layer (an OpenAI-compatible proxy handler) is an external
//! collaborator; it produces [`ChatRequest`] values from wire requests and
//! turns [`AgentReply`] values back into wire responses. This module only
//! defines the shapes exchanged at that boundary.

use serde::{Deserialize, Serialize};

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a message with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// An inbound request as extracted by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Agent model name, with or without the provider prefix
    /// (e.g. `agentgate/release-desk` or `release-desk`)
    pub model: String,

    /// Full conversation so far, oldest first
    pub messages: Vec<ChatMessage>,

    /// Opaque user identifier; partitions credentials and caches
    pub user_id: String,

    /// Opaque session identifier; only affects conversation-history
    /// continuity in the run engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// The latest user message, which is what the configuration pass scans.
    ///
    /// Falls back to concatenating all message contents when no user message
    /// is present (mirrors how the proxy handler extracts the turn text).
    pub fn latest_user_message(&self) -> String {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_else(|| {
                self.messages
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
    }
}

/// Reply from the lifecycle wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentReply {
    /// A configuration prompt produced without invoking the run engine.
    Prompt(String),

    /// The run engine's completion text.
    Completion(String),
}

impl AgentReply {
    /// The reply text regardless of variant.
    pub fn text(&self) -> &str {
        match self {
            Self::Prompt(s) | Self::Completion(s) => s,
        }
    }

    /// Whether this reply is a configuration prompt.
    pub fn is_prompt(&self) -> bool {
        matches!(self, Self::Prompt(_))
    }
}
