//! Per-user credential persistence.
//!
//! The store is the only durable shared state in the core: the agent cache
//! and the external-prompt cache are process-local and rebuildable from it,
//! so crash recovery is "caches start empty".
//!
//! Records are keyed by `(kind, user_id)` where `kind` is the owning
//! capability's name. Payloads are schema-free JSON; each capability decides
//! what it stores (a token plus server URL, a color name, a token set).

mod memory;
mod sqlite;

pub use memory::InMemoryCredentialStore;
pub use sqlite::SqliteCredentialStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// A stored credential payload with bookkeeping timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Capability-defined payload
    pub value: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Create a fresh record stamped with the current time.
    pub fn new(value: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            value,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Key-value persistence for per-user credentials.
///
/// No transactional multi-key guarantee is required across kinds; callers
/// serialize same-user mutation above this layer.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the record for `(kind, user_id)`, if any.
    async fn get(&self, kind: &str, user_id: &str) -> Result<Option<CredentialRecord>, GateError>;

    /// Insert or update the record for `(kind, user_id)`.
    ///
    /// An update preserves `created_at` and refreshes `updated_at`.
    async fn put(
        &self,
        kind: &str,
        user_id: &str,
        value: serde_json::Value,
    ) -> Result<(), GateError>;

    /// Delete the record for `(kind, user_id)`. Deleting a missing record
    /// is not an error.
    async fn delete(&self, kind: &str, user_id: &str) -> Result<(), GateError>;
}
