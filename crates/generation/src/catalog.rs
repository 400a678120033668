//! Model catalog: search and rank remote models for a requested capability.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use fleet_common::{FleetError, RankingWeights, Result};

use crate::transport::GenerationTransport;

/// A remote model as seen by one catalog query. Transient; ranking score
/// is filled in by `discover`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub owner: String,
    pub project: String,
    pub name: String,
    pub description: String,
    pub cost: String,
    pub cost_unit: String,
    pub avg_duration: String,
    pub runs: u64,
    pub tags: Vec<String>,
    pub catalog_id: String,
    pub score: i64,
}

impl ModelDescriptor {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.project)
    }
}

fn str_field(tool: &Value, key: &str) -> String {
    match tool.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn u64_field(tool: &Value, key: &str) -> u64 {
    match tool.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.replace(',', "").parse().unwrap_or(0),
        _ => 0,
    }
}

fn tags_field(tool: &Value) -> Vec<String> {
    match tool.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => s.split(',').map(|t| t.trim().to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Broaden a task type into the known synonym queries, original first.
fn synonym_queries(task_type: &str) -> Vec<String> {
    let mut queries = vec![task_type.to_string()];
    let mut push = |q: &str| {
        if !queries.iter().any(|existing| existing == q) {
            queries.push(q.to_string());
        }
    };
    if task_type.contains("video") {
        push("video-generation");
        push("image-to-video");
    } else if task_type.contains("image") {
        push("text-to-image");
    } else if task_type.contains("audio") || task_type.contains("speech") {
        push("text-to-speech");
    }
    queries
}

/// Searches and ranks the remote model catalog.
pub struct ModelCatalog {
    transport: GenerationTransport,
    weights: RankingWeights,
    search_limit: usize,
}

impl ModelCatalog {
    pub fn new(transport: GenerationTransport, weights: RankingWeights, search_limit: usize) -> Self {
        Self { transport, weights, search_limit }
    }

    /// Deterministic additive ranking score for one candidate.
    pub fn score(&self, model: &ModelDescriptor) -> i64 {
        let mut score = 0;
        if model.tags.iter().any(|t| t == "fast-inference") {
            score += self.weights.fast_inference;
        }
        if model.tags.iter().any(|t| t == "partner") {
            score += self.weights.partner;
        }
        if self.weights.curated_owners.iter().any(|o| o == &model.owner) {
            score += self.weights.curated_owner;
        }
        if model.runs > self.weights.high_run_threshold {
            score += self.weights.high_runs;
        } else if model.runs > self.weights.mid_run_threshold {
            score += self.weights.mid_runs;
        }
        score
    }

    /// Run one catalog search and map raw tool entries.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ModelDescriptor>> {
        let raw = self.transport.tool_list(query, limit).await?;
        let tools = raw.get("tool").and_then(Value::as_array).cloned().unwrap_or_default();
        debug!("catalog search '{}' returned {} tools", query, tools.len());

        let models = tools
            .iter()
            .filter_map(|tool| {
                let owner = str_field(tool, "cleanslugowner");
                let project = str_field(tool, "cleanslugproject");
                if owner.is_empty() || project.is_empty() {
                    return None;
                }
                let mut name = str_field(tool, "title");
                if name.is_empty() {
                    name = str_field(tool, "seotitle");
                }
                if name.is_empty() {
                    name = format!("{owner}/{project}");
                }
                Some(ModelDescriptor {
                    name,
                    description: str_field(tool, "description"),
                    cost: str_field(tool, "cost"),
                    cost_unit: str_field(tool, "costunit"),
                    avg_duration: str_field(tool, "averageelapsedtime"),
                    runs: u64_field(tool, "runcount"),
                    tags: tags_field(tool),
                    catalog_id: str_field(tool, "id"),
                    score: 0,
                    owner,
                    project,
                })
            })
            .collect();

        Ok(models)
    }

    /// Search with synonym broadening, de-duplicate by catalog id, score
    /// and rank. Ties keep catalog order (stable sort).
    pub async fn discover(&self, task_type: &str) -> Result<Vec<ModelDescriptor>> {
        let mut candidates: Vec<ModelDescriptor> = Vec::new();

        for query in synonym_queries(task_type) {
            match self.search(&query, self.search_limit).await {
                Ok(models) => {
                    for model in models {
                        let seen = candidates.iter().any(|c| {
                            if c.catalog_id.is_empty() || model.catalog_id.is_empty() {
                                c.owner == model.owner && c.project == model.project
                            } else {
                                c.catalog_id == model.catalog_id
                            }
                        });
                        if !seen {
                            candidates.push(model);
                        }
                    }
                }
                Err(e) => warn!("catalog query '{}' failed: {}", query, e),
            }
        }

        if candidates.is_empty() {
            return Err(FleetError::ModelDiscovery(task_type.to_string()));
        }

        for model in &mut candidates {
            model.score = self.score(model);
        }
        candidates.sort_by(|a, b| b.score.cmp(&a.score));

        info!(
            "discovered {} models for '{}', top: {} (score {})",
            candidates.len(),
            task_type,
            candidates[0].slug(),
            candidates[0].score
        );
        Ok(candidates)
    }
}
