//! Generation gateway: model discovery, schema-driven parameter synthesis
//! and the signed submit/poll protocol behind one `generate` operation.

use std::sync::Arc;
use std::time::Instant;

use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use fleet_common::{FleetError, GenerationConfig, Result};

use crate::catalog::{ModelCatalog, ModelDescriptor};
use crate::params::synthesize;
use crate::schema::{parse_model_inputs, ParameterSpec};
use crate::task::{GenerationTask, TaskState, SUCCESS_STATUS};
use crate::transport::{GenerationTransport, TaskOutput};

/// Terminal outcome of one generation request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    /// Remote terminal status, or a local status ("error", "timeout").
    pub status: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<TaskOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,
}

impl GenerationResult {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            success: false,
            task_id: None,
            output_url: None,
            outputs: Vec::new(),
            message: Some(message.into()),
            model_used: None,
            model_owner: None,
            model_project: None,
            elapsed: None,
        }
    }

    fn timeout(task_id: &str) -> Self {
        Self {
            status: "timeout".to_string(),
            success: false,
            task_id: Some(task_id.to_string()),
            output_url: None,
            outputs: Vec::new(),
            message: Some("Polling timed out".to_string()),
            model_used: None,
            model_owner: None,
            model_project: None,
            elapsed: None,
        }
    }

    fn from_task(task: &GenerationTask) -> Self {
        Self {
            status: task.status.clone(),
            success: task.state == TaskState::Succeeded,
            task_id: Some(task.task_id.clone()),
            output_url: task.output_url(),
            outputs: task.outputs.clone(),
            message: None,
            model_used: None,
            model_owner: None,
            model_project: None,
            elapsed: task.elapsed,
        }
    }
}

/// Composes the catalog, the schema cache and the signed transport.
pub struct GenerationGateway {
    transport: GenerationTransport,
    catalog: ModelCatalog,
    /// Parameter specs keyed by "owner/project". Entries are write-once
    /// immutable; a duplicate parse on a concurrent miss is idempotent.
    schema_cache: Cache<String, Arc<Vec<ParameterSpec>>>,
    config: GenerationConfig,
}

impl GenerationGateway {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let transport = GenerationTransport::new(&config)?;
        let catalog = ModelCatalog::new(
            transport.clone(),
            config.ranking.clone(),
            config.search_limit,
        );
        let schema_cache = Cache::builder()
            .time_to_live(config.schema_cache_ttl())
            .max_capacity(1024)
            .build();
        Ok(Self { transport, catalog, schema_cache, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Ranked candidates for a task type, without submitting anything.
    /// Used by the suggestion phase.
    pub async fn suggest(&self, task_type: &str, count: usize) -> Result<Vec<ModelDescriptor>> {
        let mut models = self.catalog.discover(task_type).await?;
        models.truncate(count);
        Ok(models)
    }

    /// Cached fetch-and-parse of a model's parameter specs. An empty list
    /// means "no usable docs", which is a fallback signal, not an error.
    pub async fn model_inputs(&self, owner: &str, project: &str) -> Arc<Vec<ParameterSpec>> {
        let key = format!("{owner}/{project}");
        let transport = self.transport.clone();
        let owner = owner.to_string();
        let project = project.to_string();
        self.schema_cache
            .get_with(key.clone(), async move {
                let docs = transport.fetch_model_docs(&owner, &project).await;
                let specs = parse_model_inputs(&docs);
                debug!("parsed {} input specs for {}", specs.len(), key);
                Arc::new(specs)
            })
            .await
    }

    /// Resolve the model to run: an explicit "owner/project" wins,
    /// otherwise the top-ranked discovery result.
    async fn resolve_model(
        &self,
        task_type: &str,
        explicit_model: Option<&str>,
    ) -> Result<(String, String, String)> {
        if let Some(slug) = explicit_model.filter(|m| m.contains('/')) {
            let (owner, project) = slug.split_once('/').unwrap_or_default();
            return Ok((owner.to_string(), project.to_string(), slug.to_string()));
        }
        let models = self.catalog.discover(task_type).await?;
        let top = models
            .into_iter()
            .next()
            .ok_or_else(|| FleetError::ModelDiscovery(task_type.to_string()))?;
        Ok((top.owner.clone(), top.project.clone(), top.name))
    }

    /// Poll a submitted task until a terminal status or the configured
    /// deadline. Idempotent once the remote task is terminal.
    pub async fn poll(&self, task_id: &str) -> Result<GenerationResult> {
        let deadline = Instant::now() + self.config.poll_deadline();
        let mut task = GenerationTask::submitted(
            task_id.to_string(),
            String::new(),
            String::new(),
            Vec::new(),
        );

        loop {
            if Instant::now() >= deadline {
                task.state = task.state.on_deadline();
                return Ok(GenerationResult::timeout(task_id));
            }

            let detail = self.transport.task_detail(task_id).await?;
            if let Some(entry) = detail.tasklist.first() {
                let status = entry.status.trim();
                task.observe(status, entry.outputs.clone(), entry.elapsedseconds);
                if task.state.is_terminal() {
                    debug!("task {} terminal with status '{}'", task_id, status);
                    return Ok(GenerationResult::from_task(&task));
                }
            }

            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    /// Full pipeline: resolve model, fetch and parse its docs, synthesize
    /// parameters, submit, poll to completion.
    #[instrument(skip(self, prompt), fields(task_type = %task_type))]
    pub async fn generate(
        &self,
        prompt: &str,
        task_type: &str,
        explicit_model: Option<&str>,
        input_media: Option<&str>,
    ) -> Result<GenerationResult> {
        let (owner, project, model_name) =
            self.resolve_model(task_type, explicit_model).await?;
        info!("generating via {}/{} ({})", owner, project, model_name);

        let specs = self.model_inputs(&owner, &project).await;
        let params = if specs.is_empty() {
            // Minimal fallback when no docs are available.
            let mut fallback = vec![("prompt".to_string(), prompt.to_string())];
            if let Some(media) = input_media {
                fallback.push(("inputImage".to_string(), format!("[\"{}\"]", media)));
            }
            fallback
        } else {
            synthesize(&specs, prompt, input_media)
        };
        debug!(
            "submitting {} params: {:?}",
            params.len(),
            params.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>()
        );

        let run = self.transport.run(&owner, &project, &params).await?;
        let mut result = if !run.errors.is_empty() {
            warn!("submission rejected: {}", run.error_text());
            GenerationResult::error(run.error_text())
        } else if let Some(task_id) = run.task_id() {
            self.poll(&task_id).await?
        } else {
            GenerationResult::error("No task id in run response")
        };
        result.model_used = Some(model_name);
        result.model_owner = Some(owner);
        result.model_project = Some(project);
        Ok(result)
    }
}
