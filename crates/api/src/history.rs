//! Conversation logs as append-only JSONL files, one per agent.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use fleet_common::{ConversationEntry, FleetError, Result};
use fleet_orchestrator::HistoryStore;

pub struct JsonlHistoryStore {
    data_dir: PathBuf,
}

impl JsonlHistoryStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn log_path(&self, agent_id: u32) -> PathBuf {
        self.data_dir.join(format!("chat-{agent_id}.jsonl"))
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    async fn append(&self, agent_id: u32, entry: ConversationEntry) -> Result<()> {
        fs::create_dir_all(&self.data_dir).await?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(agent_id))
            .await
            .map_err(|e| FleetError::history(format!("open log for {agent_id}: {e}")))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| FleetError::history(format!("append log for {agent_id}: {e}")))?;
        Ok(())
    }

    async fn recent(&self, agent_id: u32, limit: usize) -> Result<Vec<ConversationEntry>> {
        let content = match fs::read_to_string(self.log_path(agent_id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(FleetError::history(format!("read log for {agent_id}: {e}")))
            }
        };

        // Malformed lines are skipped, not fatal; a torn final write must
        // not poison the whole log.
        let entries: Vec<ConversationEntry> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("skipping malformed log line for agent {}: {}", agent_id, e);
                    None
                }
            })
            .collect();
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.into_iter().skip(skip).collect())
    }
}
