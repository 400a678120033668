//! Agent execution over `docker exec`.
//!
//! Each agent lives in its own container named `{prefix}-{id}`; asking an
//! agent something means running the configured command inside that
//! container with the message as the final argument.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use fleet_common::{FleetError, Result, ServerConfig};
use fleet_orchestrator::AgentExecutor;

pub struct DockerAgentExecutor {
    container_prefix: String,
    agent_command: Vec<String>,
}

impl DockerAgentExecutor {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            container_prefix: config.container_prefix.clone(),
            agent_command: config.agent_command.clone(),
        }
    }

    fn container_name(&self, agent_id: u32) -> String {
        format!("{}-{}", self.container_prefix, agent_id)
    }
}

#[async_trait]
impl AgentExecutor for DockerAgentExecutor {
    #[instrument(skip(self, text), fields(agent_id = agent_id))]
    async fn exec(&self, agent_id: u32, text: &str, timeout: Duration) -> Result<String> {
        let container = self.container_name(agent_id);
        let mut command = Command::new("docker");
        command
            .arg("exec")
            .arg(&container)
            .args(&self.agent_command)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("exec in {} ({}s budget)", container, timeout.as_secs());
        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| {
                FleetError::timeout(format!(
                    "agent {agent_id} did not answer within {}s",
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| FleetError::AgentNotAvailable(format!("{container}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FleetError::AgentNotAvailable(format!(
                "{container}: {}",
                stderr.trim()
            )));
        }
        Ok(clean_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Strip carriage returns and surrounding blank lines from container
/// output; agent CLIs tend to emit both.
fn clean_output(raw: &str) -> String {
    raw.replace('\r', "")
        .lines()
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
