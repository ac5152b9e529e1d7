//! In-memory credential store for tests and ephemeral deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{CredentialRecord, CredentialStore};
use crate::error::GateError;

/// Credential store backed by a process-local map.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    records: RwLock<HashMap<(String, String), CredentialRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, kind: &str, user_id: &str) -> Result<Option<CredentialRecord>, GateError> {
        let records = self.records.read().await;
        Ok(records
            .get(&(kind.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn put(
        &self,
        kind: &str,
        user_id: &str,
        value: serde_json::Value,
    ) -> Result<(), GateError> {
        let mut records = self.records.write().await;
        let key = (kind.to_string(), user_id.to_string());

        match records.get_mut(&key) {
            Some(existing) => {
                existing.value = value;
                existing.updated_at = Utc::now();
            }
            None => {
                records.insert(key, CredentialRecord::new(value));
            }
        }
        Ok(())
    }

    async fn delete(&self, kind: &str, user_id: &str) -> Result<(), GateError> {
        let mut records = self.records.write().await;
        records.remove(&(kind.to_string(), user_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_cycle() {
        let store = InMemoryCredentialStore::new();

        assert!(store.get("k", "u").await.unwrap().is_none());

        store.put("k", "u", serde_json::json!(1)).await.unwrap();
        assert_eq!(store.get("k", "u").await.unwrap().unwrap().value, 1);

        store.put("k", "u", serde_json::json!(2)).await.unwrap();
        assert_eq!(store.get("k", "u").await.unwrap().unwrap().value, 2);

        store.delete("k", "u").await.unwrap();
        assert!(store.get("k", "u").await.unwrap().is_none());
    }
}
