use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{FleetError, Result};
use crate::types::AgentDescriptor;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,

    /// Agent containers are named `{container_prefix}-{id}`.
    pub container_prefix: String,

    /// Command executed inside the container; the message is appended
    /// as the final argument.
    pub agent_command: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            data_dir: PathBuf::from("data"),
            container_prefix: "fleet-agent".to_string(),
            agent_command: vec![
                "node".to_string(),
                "agent.mjs".to_string(),
                "-m".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Generation API base, e.g. "https://api.example.ai".
    pub base_url: String,

    /// Model documentation site base.
    pub site_url: String,

    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,

    pub poll_interval_secs: u64,
    pub poll_deadline_secs: u64,

    /// TTL for the cached parameter specs keyed by owner/project.
    pub schema_cache_ttl_secs: u64,

    /// Per-query result limit for catalog searches.
    pub search_limit: usize,

    #[serde(default)]
    pub ranking: RankingWeights,
}

impl GenerationConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_deadline(&self) -> Duration {
        Duration::from_secs(self.poll_deadline_secs)
    }

    pub fn schema_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.schema_cache_ttl_secs)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.wiro.ai".to_string(),
            site_url: "https://wiro.ai".to_string(), // model docs live on the site, not the API host
            api_key: String::new(),
            api_secret: String::new(),
            poll_interval_secs: 3,
            poll_deadline_secs: 120,
            schema_cache_ttl_secs: 600,
            search_limit: 10,
            ranking: RankingWeights::default(),
        }
    }
}

/// Additive model-ranking weights. Empirical values, kept as configuration
/// so they can be tuned without code changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingWeights {
    pub fast_inference: i64,
    pub partner: i64,
    pub curated_owner: i64,
    pub high_runs: i64,
    pub mid_runs: i64,
    pub high_run_threshold: u64,
    pub mid_run_threshold: u64,

    /// Owners known to run low-latency serving.
    pub curated_owners: Vec<String>,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            fast_inference: 10,
            partner: 5,
            curated_owner: 8,
            high_runs: 3,
            mid_runs: 1,
            high_run_threshold: 10_000,
            mid_run_threshold: 1_000,
            curated_owners: vec![
                "google".to_string(),
                "openai".to_string(),
                "bytedance".to_string(),
                "black-forest-labs".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Fleet roster; ids are 1-based and dense.
    #[serde(default)]
    pub agents: Vec<AgentDescriptor>,

    /// The distinguished agent that runs analysis, suggestion and
    /// combination steps.
    pub orchestrator_id: u32,

    pub agent_timeout_secs: u64,
    /// Delegated sub-tasks get a larger budget than single-turn calls.
    pub delegation_timeout_secs: u64,

    /// How many candidate models a suggestion turn presents.
    pub suggestion_count: usize,

    /// How far back to scan history for media URLs.
    pub history_scan_limit: usize,
    /// How far back to scan for suggestion markers.
    pub marker_scan_limit: usize,

    pub document_snippet_limit: usize,
    pub snippet_score_floor: f32,
}

impl OrchestratorConfig {
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }

    pub fn delegation_timeout(&self) -> Duration {
        Duration::from_secs(self.delegation_timeout_secs)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            agents: Vec::new(),
            orchestrator_id: 1,
            agent_timeout_secs: 60,
            delegation_timeout_secs: 120,
            suggestion_count: 3,
            history_scan_limit: 200,
            marker_scan_limit: 10,
            document_snippet_limit: 5,
            snippet_score_floor: 0.3,
        }
    }
}

impl SystemConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SystemConfig =
            toml::from_str(&content).map_err(|e| FleetError::config(e.to_string()))?;
        Ok(config)
    }
}
