//! The orchestration state machine.
//!
//! One run drives `analyzing` into one of the suggest / generate /
//! delegate / direct / fallback branches, optionally `combining`, and
//! always terminates with `done` or `error` followed by `close`. Every
//! external call is awaited before the next step; delegations execute
//! strictly one at a time, so event order matches aggregation order.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument, warn};

use fleet_common::{ChatRole, ConversationEntry, OrchestratorConfig};

use crate::collaborators::{AgentExecutor, DocumentIndex, HistoryStore, MediaGenerator, Roster};
use crate::events::{DelegationStep, EventSink, OrchestrationEvent, PlannedDelegation};
use crate::plan::{interpret, Branch, MediaRequest, Plan};
use crate::prompts::{
    analysis_prompt, combine_prompt, concatenated_responses, extract_media_urls,
    looks_like_image_url, media_hint, mentions_video, SuggestionMarker,
};

const NOT_CONFIGURED_MESSAGE: &str =
    "Media generation is not configured. Add your API key and secret in settings.";
const NO_MODELS_MESSAGE: &str =
    "No models found for this task type. Try a different request.";

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub struct OrchestrationEngine {
    roster: Roster,
    executor: Arc<dyn AgentExecutor>,
    history: Arc<dyn HistoryStore>,
    documents: Arc<dyn DocumentIndex>,
    generator: Arc<dyn MediaGenerator>,
    config: OrchestratorConfig,
}

impl OrchestrationEngine {
    pub fn new(
        roster: Roster,
        executor: Arc<dyn AgentExecutor>,
        history: Arc<dyn HistoryStore>,
        documents: Arc<dyn DocumentIndex>,
        generator: Arc<dyn MediaGenerator>,
        config: OrchestratorConfig,
    ) -> Self {
        Self { roster, executor, history, documents, generator, config }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    fn orchestrator_id(&self) -> u32 {
        self.roster.orchestrator_id
    }

    /// Run one orchestration end-to-end, emitting progress into `sink`.
    #[instrument(skip_all, fields(orchestrator = self.roster.orchestrator_id))]
    pub async fn run(&self, message: &str, sink: &EventSink) {
        let message = message.trim();
        if message.is_empty() {
            sink.error("message required");
            return;
        }

        let media_urls = self.collect_media_urls().await;

        // A bare numeral right after a suggestion turn is a selection,
        // not a new request; it skips analysis entirely.
        if matches!(message, "1" | "2" | "3")
            && self.try_numeric_selection(message, &media_urls, sink).await
        {
            return;
        }

        let raw_plan = match self.analyze(message, &media_urls, sink).await {
            Some(raw) => raw,
            None => return, // terminal event already emitted
        };

        match interpret(&raw_plan) {
            None => self.run_direct_after_unparsed(message, &raw_plan, sink).await,
            Some(plan) => match plan.branch() {
                Branch::Suggest => self.run_suggest(&plan, message, sink).await,
                Branch::Direct => self.run_direct(&plan, message, sink).await,
                Branch::Generate => {
                    self.run_generate(&plan, message, &media_urls, sink).await
                }
                Branch::Delegate => {
                    self.run_delegations(&plan, message, &raw_plan, sink).await
                }
            },
        }
    }

    // ── analysis ─────────────────────────────────────────────

    /// Ask the orchestrator agent for a routing plan. On exec failure
    /// falls back to answering the raw message directly; a second failure
    /// is the only run-terminating error.
    async fn analyze(
        &self,
        message: &str,
        media_urls: &[String],
        sink: &EventSink,
    ) -> Option<String> {
        let orch = self.orchestrator_id();
        let prompt = analysis_prompt(
            &self.roster,
            message,
            &media_hint(media_urls),
            &self.selection_hint().await,
            &self.document_context(message).await,
        );

        sink.phase("analyzing", "Analyzing task...");
        match self.executor.exec(orch, &prompt, self.config.agent_timeout()).await {
            Ok(raw) => Some(raw),
            Err(analysis_err) => {
                warn!("analysis failed: {}", analysis_err);
                sink.phase("fallback", "Answering directly...");
                match self.executor.exec(orch, message, self.config.agent_timeout()).await {
                    Ok(fallback) => {
                        self.persist_exchange(message, &fallback).await;
                        sink.done(fallback, vec![], "direct (fallback)");
                    }
                    Err(_) => {
                        sink.error(format!("Orchestrator failed: {analysis_err}"));
                    }
                }
                None
            }
        }
    }

    /// Interpreter produced nothing usable: answer the raw message
    /// directly, falling back to the unparsed reply itself.
    async fn run_direct_after_unparsed(&self, message: &str, raw_plan: &str, sink: &EventSink) {
        let orch = self.orchestrator_id();
        sink.phase("direct", "Answering directly...");
        let response = self
            .executor
            .exec(orch, message, self.config.agent_timeout())
            .await
            .unwrap_or_else(|_| raw_plan.to_string());
        self.persist_exchange(message, &response).await;
        sink.done(response, vec![], "direct");
    }

    async fn run_direct(&self, plan: &Plan, message: &str, sink: &EventSink) {
        let answer = plan.direct_answer.clone().unwrap_or_default();
        self.persist_exchange(message, &answer).await;
        sink.emit(OrchestrationEvent::Plan {
            plan: plan.summary("direct"),
            delegations: vec![],
        });
        sink.done(answer, vec![], plan.summary("direct"));
    }

    // ── suggestion ───────────────────────────────────────────

    async fn run_suggest(&self, plan: &Plan, message: &str, sink: &EventSink) {
        let request = plan.suggest_media.clone().unwrap_or_default();
        let prompt = if request.prompt.is_empty() { message } else { &request.prompt };

        sink.emit(OrchestrationEvent::Plan {
            plan: plan.summary("suggest models"),
            delegations: vec![],
        });
        sink.phase("suggesting", "Searching for suitable models...");

        if !self.generator.is_configured() {
            self.persist_exchange(message, NOT_CONFIGURED_MESSAGE).await;
            sink.done(NOT_CONFIGURED_MESSAGE, vec![], "generator not configured");
            return;
        }

        let models = match self
            .generator
            .suggest(&request.task_type, self.config.suggestion_count)
            .await
        {
            Ok(models) => models,
            Err(e) => {
                warn!("model search failed: {}", e);
                self.persist_exchange(message, NO_MODELS_MESSAGE).await;
                sink.done(NO_MODELS_MESSAGE, vec![], "no models");
                return;
            }
        };
        if models.is_empty() {
            self.persist_exchange(message, NO_MODELS_MESSAGE).await;
            sink.done(NO_MODELS_MESSAGE, vec![], "no models");
            return;
        }

        let mut lines =
            vec!["I found these models for your request. Pick one and I'll generate:\n".to_string()];
        for (index, model) in models.iter().enumerate() {
            lines.push(format!("**{}. {}**", index + 1, model.name));
            lines.push(format!("   {}", truncate(&model.description, 120)));
            let speed = if model.avg_duration.is_empty() {
                String::new()
            } else {
                format!(" | {}", model.avg_duration)
            };
            lines.push(format!("   Cost: {}{} | {} runs", model.cost, speed, model.runs));
            lines.push(String::new());
        }
        lines.push(format!("_Your prompt: \"{}\"_", truncate(prompt, 100)));
        lines.push("\nJust reply with the number (1, 2, or 3) to generate.".to_string());
        let answer = lines.join("\n");

        let marker = SuggestionMarker {
            options: models
                .iter()
                .map(|m| crate::prompts::CandidateModel {
                    owner: m.owner.clone(),
                    project: m.project.clone(),
                    name: m.name.clone(),
                })
                .collect(),
            prompt: prompt.to_string(),
            task_type: request.task_type.clone(),
        };
        self.persist_exchange(message, &marker.tag(&answer)).await;
        sink.done(answer, vec![], "model suggestions");
    }

    /// Resolve a bare numeral against the latest suggestion marker.
    /// Returns false when no marker or index applies, which re-routes the
    /// numeral through normal analysis.
    async fn try_numeric_selection(
        &self,
        message: &str,
        media_urls: &[String],
        sink: &EventSink,
    ) -> bool {
        let Some(marker) = self.latest_marker().await else {
            return false;
        };
        let index: usize = match message.parse::<usize>() {
            Ok(n) if n >= 1 => n - 1,
            _ => return false,
        };
        let Some(chosen) = marker.options.get(index) else {
            return false;
        };

        let slug = format!("{}/{}", chosen.owner, chosen.project);
        info!("numeric selection {} -> {}", message, slug);
        sink.phase("generating", format!("Generating with {}...", chosen.name));

        let input_media = if marker.task_type.contains("video") {
            media_urls.last().cloned()
        } else {
            None
        };
        let request = MediaRequest {
            prompt: if marker.prompt.is_empty() { message.to_string() } else { marker.prompt },
            task_type: marker.task_type,
            model: Some(slug.clone()),
            input_media,
        };

        let answer = self.invoke_generator(&request, Some(&chosen.name)).await;
        self.persist_exchange(message, &answer).await;
        sink.done(answer, vec![], format!("generate with {slug}"));
        true
    }

    // ── generation ───────────────────────────────────────────

    async fn run_generate(
        &self,
        plan: &Plan,
        message: &str,
        media_urls: &[String],
        sink: &EventSink,
    ) {
        let mut request = plan.generate_media.clone().unwrap_or_default();
        if request.prompt.is_empty() {
            request.prompt = message.to_string();
        }

        // Image-to-video auto-upgrade: a motion keyword plus a recent
        // image URL, with no explicit input or video task type given.
        if mentions_video(message) {
            if let Some(recent) = media_urls.last() {
                if looks_like_image_url(recent)
                    && request.input_media.is_none()
                    && !request.task_type.contains("video")
                {
                    info!("auto-upgrading to image-to-video with {}", recent);
                    request.input_media = Some(recent.clone());
                    request.task_type = "image-to-video".to_string();
                }
            }
        }

        // The plan sometimes echoes the raw selection message; the real
        // prompt lives in the last suggestion marker.
        if request.prompt == message {
            if let Some(marker) = self.latest_marker().await {
                if !marker.prompt.is_empty() {
                    request.prompt = marker.prompt;
                    request.task_type = marker.task_type;
                }
            }
        }

        sink.emit(OrchestrationEvent::Plan {
            plan: plan.summary(&format!("generate {}", request.task_type)),
            delegations: vec![],
        });
        sink.phase("generating", format!("Generating media ({})...", request.task_type));

        if !self.generator.is_configured() {
            self.persist_exchange(message, NOT_CONFIGURED_MESSAGE).await;
            sink.done(NOT_CONFIGURED_MESSAGE, vec![], "generator not configured");
            return;
        }

        let answer = self.invoke_generator(&request, None).await;
        self.persist_exchange(message, &answer).await;
        let plan_label = if answer.starts_with("Generated with") {
            format!("generate {}", request.task_type)
        } else {
            "generation error".to_string()
        };
        sink.done(answer, vec![], plan_label);
    }

    /// Invoke the generator and fold every failure mode into a textual
    /// answer; generation problems never abort the run.
    async fn invoke_generator(
        &self,
        request: &MediaRequest,
        model_name: Option<&str>,
    ) -> String {
        if !self.generator.is_configured() {
            return NOT_CONFIGURED_MESSAGE.to_string();
        }
        match self.generator.generate(request).await {
            Ok(result) => {
                let model = model_name
                    .map(str::to_string)
                    .or_else(|| result.model_used.clone())
                    .unwrap_or_else(|| "the selected model".to_string());
                match result.output_url {
                    Some(url) => format!("Generated with **{model}**:\n\n{url}"),
                    None => {
                        let reason = result
                            .message
                            .unwrap_or_else(|| result.status.clone());
                        format!("Generation failed: {reason}")
                    }
                }
            }
            Err(e) => format!("Generation error: {e}"),
        }
    }

    // ── delegation ───────────────────────────────────────────

    async fn run_delegations(
        &self,
        plan: &Plan,
        message: &str,
        raw_plan: &str,
        sink: &EventSink,
    ) {
        let orch = self.orchestrator_id();

        let planned = plan
            .delegations
            .iter()
            .map(|d| {
                let descriptor = u32::try_from(d.agent_id)
                    .ok()
                    .and_then(|id| self.roster.descriptor(id));
                PlannedDelegation {
                    agent_id: d.agent_id,
                    task: truncate(&d.task, 120),
                    agent_name: descriptor
                        .map(|a| a.name.clone())
                        .unwrap_or_else(|| format!("Agent {}", d.agent_id)),
                    agent_emoji: descriptor.map(|a| a.emoji.clone()).unwrap_or_default(),
                }
            })
            .collect();
        sink.emit(OrchestrationEvent::Plan { plan: plan.summary(""), delegations: planned });

        let mut chain: Vec<DelegationStep> = Vec::new();
        for delegation in &plan.delegations {
            if !self.roster.is_valid_target(delegation.agent_id)
                || delegation.task.trim().is_empty()
            {
                info!("skipping invalid delegation to {}", delegation.agent_id);
                continue;
            }
            let target = delegation.agent_id as u32;
            let descriptor = self.roster.descriptor(target);
            let mut step = DelegationStep {
                agent_id: target,
                agent_name: descriptor
                    .map(|a| a.name.clone())
                    .unwrap_or_else(|| format!("Agent {target}")),
                agent_emoji: descriptor.map(|a| a.emoji.clone()).unwrap_or_default(),
                role: descriptor.map(|a| a.role.clone()).unwrap_or_default(),
                task: delegation.task.clone(),
                response: String::new(),
            };
            sink.emit(OrchestrationEvent::Delegating(step.clone()));

            step.response = match self
                .executor
                .exec(target, &delegation.task, self.config.delegation_timeout())
                .await
            {
                Ok(response) => response,
                Err(e) => format!("(Agent {target} error: {e})"),
            };
            chain.push(step.clone());
            sink.emit(OrchestrationEvent::AgentDone(step.clone()));

            self.log_delegation(orch, target, &step).await;
        }

        let final_answer = if chain.is_empty() {
            plan.direct_answer.clone().unwrap_or_else(|| raw_plan.to_string())
        } else {
            sink.emit(OrchestrationEvent::Combining {
                message: "Combining results...".to_string(),
            });
            match self
                .executor
                .exec(orch, &combine_prompt(message, &chain), self.config.agent_timeout())
                .await
            {
                Ok(combined) => combined,
                Err(e) => {
                    warn!("combine failed, concatenating: {}", e);
                    concatenated_responses(&chain)
                }
            }
        };

        self.persist_exchange(message, &final_answer).await;
        sink.done(final_answer, chain, plan.summary(""));
    }

    /// Record the delegation exchange in both agents' logs.
    async fn log_delegation(&self, orch: u32, target: u32, step: &DelegationStep) {
        let inbound = json!({
            "direction": "in",
            "from_agent": orch,
            "task": step.task,
            "response": truncate(&step.response, 500),
        });
        let outbound = json!({
            "direction": "out",
            "to_agent": target,
            "task": step.task,
            "response": truncate(&step.response, 500),
        });
        if let Err(e) = self
            .history
            .append(target, ConversationEntry::now(ChatRole::Delegation, inbound.to_string()))
            .await
        {
            warn!("failed to log delegation for agent {}: {}", target, e);
        }
        if let Err(e) = self
            .history
            .append(orch, ConversationEntry::now(ChatRole::Delegation, outbound.to_string()))
            .await
        {
            warn!("failed to log delegation for orchestrator: {}", e);
        }
    }

    // ── context gathering ────────────────────────────────────

    /// Media URLs recoverable from recent conversation, oldest first;
    /// the last one is the likely referent of "this image/video".
    async fn collect_media_urls(&self) -> Vec<String> {
        let entries = match self
            .history
            .recent(self.orchestrator_id(), self.config.history_scan_limit)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!("history scan failed: {}", e);
                return Vec::new();
            }
        };
        let mut urls: Vec<String> = Vec::new();
        for entry in &entries {
            for url in extract_media_urls(&entry.content) {
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }
        urls
    }

    async fn latest_marker(&self) -> Option<SuggestionMarker> {
        let entries = self
            .history
            .recent(self.orchestrator_id(), self.config.marker_scan_limit)
            .await
            .ok()?;
        entries
            .iter()
            .rev()
            .filter(|e| e.role == ChatRole::Assistant)
            .find_map(|e| SuggestionMarker::parse(&e.content))
    }

    /// Hint for the router when the previous turn offered model options.
    async fn selection_hint(&self) -> String {
        let Some(marker) = self.latest_marker().await else {
            return String::new();
        };
        let options = marker
            .options
            .iter()
            .enumerate()
            .map(|(i, o)| format!("{}. {} ({}/{})", i + 1, o.name, o.owner, o.project))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "\nThe user was previously shown model options. If they are selecting one \
             (by number, name, or description), use generate_media with the selected model. \
             Include \"model\":\"owner/project\" in generate_media.\n\
             Previous options shown:\n{options}\n"
        )
    }

    /// Relevant snippets from uploaded documents, when the index has any.
    async fn document_context(&self, message: &str) -> String {
        let snippets = match self
            .documents
            .search(
                self.orchestrator_id(),
                message,
                self.config.document_snippet_limit,
            )
            .await
        {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!("document search failed: {}", e);
                return String::new();
            }
        };
        let relevant: Vec<String> = snippets
            .iter()
            .filter(|s| s.score > self.config.snippet_score_floor)
            .map(|s| format!("[{}]: {}", s.filename, s.content))
            .collect();
        if relevant.is_empty() {
            return String::new();
        }
        format!(
            "\nRelevant context from uploaded documents:\n{}\n",
            relevant.join("\n")
        )
    }

    async fn persist_exchange(&self, user_message: &str, answer: &str) {
        let orch = self.orchestrator_id();
        if let Err(e) = self
            .history
            .append(orch, ConversationEntry::now(ChatRole::User, user_message))
            .await
        {
            warn!("failed to persist user message: {}", e);
        }
        if let Err(e) = self
            .history
            .append(orch, ConversationEntry::now(ChatRole::Assistant, answer))
            .await
        {
            warn!("failed to persist answer: {}", e);
        }
    }
}
