//! Shared test doubles for the core's seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::chat::ChatMessage;
use crate::engine::{AgentBlueprint, RunEngine, RunnableAgent};
use crate::error::GateError;
use crate::toolkit::DocumentBackend;

/// Document backend serving canned documents; fails on misses.
pub(crate) struct StaticBackend {
    documents: HashMap<String, String>,
}

impl StaticBackend {
    pub(crate) fn with_document(doc_ref: &str, content: &str) -> Self {
        let mut documents = HashMap::new();
        documents.insert(doc_ref.to_string(), content.to_string());
        Self { documents }
    }

    pub(crate) fn empty() -> Self {
        Self {
            documents: HashMap::new(),
        }
    }
}

#[async_trait]
impl DocumentBackend for StaticBackend {
    async fn fetch(&self, doc_ref: &str, _token: &str) -> Result<String, GateError> {
        self.documents
            .get(doc_ref)
            .cloned()
            .ok_or_else(|| GateError::PromptFetch(format!("Document '{doc_ref}' not found")))
    }
}

/// Run engine that counts builds and returns agents echoing their
/// composed instructions, so tests can observe what a build saw.
#[derive(Default)]
pub(crate) struct CountingEngine {
    builds: AtomicUsize,
    /// Artificial build latency to widen race windows in dedup tests.
    pub(crate) build_delay_ms: u64,
}

impl CountingEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(build_delay_ms: u64) -> Self {
        Self {
            builds: AtomicUsize::new(0),
            build_delay_ms,
        }
    }

    pub(crate) fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RunEngine for CountingEngine {
    async fn build(&self, blueprint: AgentBlueprint) -> anyhow::Result<Arc<dyn RunnableAgent>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.build_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.build_delay_ms)).await;
        }
        Ok(Arc::new(EchoAgent {
            instructions: blueprint.instructions,
            toolkit_names: blueprint
                .toolkits
                .iter()
                .map(|t| t.name().to_string())
                .collect(),
        }))
    }
}

/// Agent whose response is its own instruction set plus the toolkit names
/// it was built with, so tests can observe the blueprint.
pub(crate) struct EchoAgent {
    pub(crate) instructions: Vec<String>,
    pub(crate) toolkit_names: Vec<String>,
}

#[async_trait]
impl RunnableAgent for EchoAgent {
    async fn run(&self, _messages: &[ChatMessage]) -> anyhow::Result<String> {
        Ok(format!(
            "{}\n[toolkits: {}]",
            self.instructions.join("\n"),
            self.toolkit_names.join(", ")
        ))
    }

    async fn run_streaming(
        &self,
        _messages: &[ChatMessage],
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>> {
        let lines = self.instructions.clone();
        Ok(Box::pin(async_stream::stream! {
            for line in lines {
                yield Ok(line);
            }
        }))
    }
}
