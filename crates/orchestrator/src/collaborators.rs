//! Collaborator seams consumed by the orchestration engine.
//!
//! Container exec, history storage and document search live outside this
//! core; the engine talks to them through these traits.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use fleet_common::{AgentDescriptor, ConversationEntry, Result};
use fleet_generation::{GenerationGateway, GenerationResult, ModelDescriptor};

use crate::plan::MediaRequest;

/// The agent roster for one run, plus the distinguished orchestrator id.
#[derive(Debug, Clone)]
pub struct Roster {
    pub agents: Vec<AgentDescriptor>,
    pub orchestrator_id: u32,
}

impl Roster {
    pub fn descriptor(&self, id: u32) -> Option<&AgentDescriptor> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Valid delegation targets are in `[1, len]` and not the
    /// orchestrator itself.
    pub fn is_valid_target(&self, id: i64) -> bool {
        id >= 1 && id <= self.agents.len() as i64 && id != i64::from(self.orchestrator_id)
    }

    pub fn text(&self) -> String {
        self.agents
            .iter()
            .map(|a| format!("- Agent {}: {} {} — {}", a.id, a.emoji, a.name, a.role))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Opaque "ask agent X this text, get text back" operation.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn exec(&self, agent_id: u32, text: &str, timeout: Duration) -> Result<String>;
}

/// Append-only conversation log, owned by the collaborator.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, agent_id: u32, entry: ConversationEntry) -> Result<()>;
    /// Most recent `limit` entries, oldest first.
    async fn recent(&self, agent_id: u32, limit: usize) -> Result<Vec<ConversationEntry>>;
}

/// A scored snippet from the uploaded-document index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSnippet {
    pub filename: String,
    pub content: String,
    pub score: f32,
}

#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn search(&self, agent_id: u32, query: &str, limit: usize)
        -> Result<Vec<DocumentSnippet>>;
}

/// Media-generation capability as seen by the engine.
#[async_trait]
pub trait MediaGenerator: Send + Sync {
    fn is_configured(&self) -> bool;
    async fn suggest(&self, task_type: &str, count: usize) -> Result<Vec<ModelDescriptor>>;
    async fn generate(&self, request: &MediaRequest) -> Result<GenerationResult>;
}

#[async_trait]
impl MediaGenerator for GenerationGateway {
    fn is_configured(&self) -> bool {
        GenerationGateway::is_configured(self)
    }

    async fn suggest(&self, task_type: &str, count: usize) -> Result<Vec<ModelDescriptor>> {
        GenerationGateway::suggest(self, task_type, count).await
    }

    async fn generate(&self, request: &MediaRequest) -> Result<GenerationResult> {
        GenerationGateway::generate(
            self,
            &request.prompt,
            &request.task_type,
            request.model.as_deref(),
            request.input_media.as_deref(),
        )
        .await
    }
}
