//! Favorite-color capability.
//!
//! The simplest capability shape: a required configuration extracted from
//! natural language, validated against a closed list, stored per user and
//! injected into the agent's instructions. Exists mostly so the demo agent
//! can exercise the whole configuration flow without external services.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::{Toolkit, ToolkitCapability};
use crate::credentials::CredentialStore;
use crate::error::GateError;

const KIND: &str = "favorite_color";

const VALID_COLORS: &[&str] = &[
    "red", "blue", "green", "yellow", "purple", "orange", "pink", "black", "white", "brown",
];

/// Required capability storing the user's favorite color.
pub struct FavoriteColorCapability {
    store: Arc<dyn CredentialStore>,
}

impl FavoriteColorCapability {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Extract a color candidate from the message, if any.
    fn extract_color(message: &str) -> Option<String> {
        let patterns = [
            // "my favorite color is X"
            r"(?i)(?:my\s+)?favorite\s+color\s+(?:is|=|:)\s+(\w+)",
            // "I like X" / "I love X"
            r"(?i)i\s+(?:like|love|prefer)\s+(\w+)",
            // "set color to X"
            r"(?i)(?:set|configure)\s+color\s+(?:to\s+)?(\w+)",
            // "color: X"
            r"(?i)color\s*[:=]\s*(\w+)",
        ];

        for pattern in patterns {
            let re = Regex::new(pattern).unwrap();
            if let Some(captures) = re.captures(message) {
                return Some(captures[1].to_lowercase());
            }
        }
        None
    }

    /// The stored color for a user, if configured.
    pub async fn stored_color(&self, user_id: &str) -> Result<Option<String>, GateError> {
        let record = self.store.get(KIND, user_id).await?;
        Ok(record.and_then(|r| r.value.get("color").and_then(|v| v.as_str().map(String::from))))
    }
}

#[async_trait]
impl ToolkitCapability for FavoriteColorCapability {
    fn name(&self) -> &str {
        KIND
    }

    async fn is_configured(&self, user_id: &str) -> Result<bool, GateError> {
        Ok(self.stored_color(user_id).await?.is_some())
    }

    async fn extract_and_store(
        &self,
        message: &str,
        user_id: &str,
    ) -> Result<Option<String>, GateError> {
        let Some(color) = Self::extract_color(message) else {
            return Ok(None);
        };

        if !VALID_COLORS.contains(&color.as_str()) {
            return Err(GateError::CredentialInvalid(format!(
                "Unsupported color '{}'. Supported colors: {}",
                color,
                VALID_COLORS.join(", ")
            )));
        }

        self.store
            .put(KIND, user_id, serde_json::json!({ "color": color }))
            .await?;
        tracing::info!(user_id, color = %color, "Stored favorite color");

        Ok(Some(format!(
            "Favorite color set to {}. The agent will use this preference from now on.",
            color
        )))
    }

    async fn config_prompt(&self, _user_id: &str) -> Result<Option<String>, GateError> {
        Ok(Some(format!(
            "Before we begin, tell me your favorite color, e.g. \
             'My favorite color is blue'. Supported colors: {}.",
            VALID_COLORS.join(", ")
        )))
    }

    async fn build(&self, user_id: &str) -> Result<Option<Arc<dyn Toolkit>>, GateError> {
        let color = self
            .stored_color(user_id)
            .await?
            .ok_or_else(|| GateError::build(KIND, "no stored color"))?;

        Ok(Some(Arc::new(ColorTools::new(color))))
    }

    async fn instructions(&self, user_id: &str) -> Result<Vec<String>, GateError> {
        let Some(color) = self.stored_color(user_id).await? else {
            return Ok(Vec::new());
        };

        Ok(vec![
            format!("The user's favorite color is {}.", color),
            format!(
                "When relevant to the conversation, incorporate references to {}.",
                color
            ),
            "Use the color tools to generate palettes and themes based on this preference."
                .to_string(),
        ])
    }
}

/// Palette and theme helpers bound to a configured favorite color.
pub struct ColorTools {
    favorite_color: String,
}

impl ColorTools {
    pub fn new(favorite_color: String) -> Self {
        Self { favorite_color }
    }

    pub fn favorite_color(&self) -> &str {
        &self.favorite_color
    }

    /// Generate a small named palette around the favorite color.
    pub fn generate_palette(&self, palette_type: &str) -> Vec<String> {
        let base = self.favorite_color.clone();
        match palette_type {
            "analogous" => vec![base.clone(), format!("light {base}"), format!("deep {base}")],
            "monochromatic" => vec![
                format!("pale {base}"),
                base.clone(),
                format!("dark {base}"),
            ],
            // complementary is the default
            _ => vec![base.clone(), complement_of(&base).to_string()],
        }
    }
}

impl Toolkit for ColorTools {
    fn name(&self) -> &str {
        "color_tools"
    }
}

fn complement_of(color: &str) -> &'static str {
    match color {
        "red" => "green",
        "green" => "red",
        "blue" => "orange",
        "orange" => "blue",
        "yellow" => "purple",
        "purple" => "yellow",
        "pink" => "green",
        "black" => "white",
        "white" => "black",
        _ => "gray",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::InMemoryCredentialStore;

    fn capability() -> FavoriteColorCapability {
        FavoriteColorCapability::new(Arc::new(InMemoryCredentialStore::new()))
    }

    #[test]
    fn extracts_common_phrasings() {
        for message in [
            "my favorite color is blue",
            "Favorite color: blue",
            "I like blue",
            "set color to blue",
            "color = blue",
        ] {
            assert_eq!(
                FavoriteColorCapability::extract_color(message).as_deref(),
                Some("blue"),
                "failed on {message:?}"
            );
        }
    }

    #[test]
    fn ignores_unrelated_messages() {
        assert!(FavoriteColorCapability::extract_color("what can you do?").is_none());
    }

    #[tokio::test]
    async fn stores_valid_color_and_reports_configured() {
        let cap = capability();
        assert!(!cap.is_configured("u1").await.unwrap());

        let confirmation = cap
            .extract_and_store("my favorite color is green", "u1")
            .await
            .unwrap();
        assert!(confirmation.unwrap().contains("green"));
        assert!(cap.is_configured("u1").await.unwrap());
        assert_eq!(cap.stored_color("u1").await.unwrap().as_deref(), Some("green"));
    }

    #[tokio::test]
    async fn rejects_invalid_color_without_storing() {
        let cap = capability();
        let err = cap
            .extract_and_store("my favorite color is chartreuse", "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::CredentialInvalid(_)));
        assert!(!cap.is_configured("u1").await.unwrap());
    }

    #[tokio::test]
    async fn extraction_is_idempotent() {
        let cap = capability();
        cap.extract_and_store("I like red", "u1").await.unwrap();
        cap.extract_and_store("I like red", "u1").await.unwrap();
        assert_eq!(cap.stored_color("u1").await.unwrap().as_deref(), Some("red"));
    }

    #[tokio::test]
    async fn re_extraction_replaces_previous_color() {
        let cap = capability();
        cap.extract_and_store("my favorite color is blue", "u1")
            .await
            .unwrap();
        cap.extract_and_store("my favorite color is green", "u1")
            .await
            .unwrap();
        assert_eq!(
            cap.stored_color("u1").await.unwrap().as_deref(),
            Some("green")
        );
    }

    #[tokio::test]
    async fn instructions_mention_stored_color() {
        let cap = capability();
        cap.extract_and_store("color: purple", "u1").await.unwrap();

        let instructions = cap.instructions("u1").await.unwrap();
        assert!(instructions.iter().any(|line| line.contains("purple")));
    }

    #[test]
    fn complementary_palette_pairs_base_with_complement() {
        let tools = ColorTools::new("blue".to_string());
        assert_eq!(tools.generate_palette("complementary"), vec!["blue", "orange"]);
    }
}
