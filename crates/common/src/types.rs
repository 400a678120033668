use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One agent in the fleet roster. The roster is immutable for the
/// duration of a single orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// 1-based agent id; id 0 is never valid.
    pub id: u32,

    /// Display name shown in progress events.
    pub name: String,

    /// Role title, e.g. "Research Analyst".
    pub role: String,

    #[serde(default)]
    pub emoji: String,

    /// Container liveness as last observed.
    #[serde(default = "default_online")]
    pub online: bool,
}

fn default_online() -> bool {
    true
}

/// Author of a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    /// Inter-agent delegation exchange, stored as a JSON payload.
    Delegation,
}

/// One record in an agent's append-only conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,

    /// Embedded media reference, if the entry carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
}

impl ConversationEntry {
    pub fn now(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            media: None,
        }
    }
}
