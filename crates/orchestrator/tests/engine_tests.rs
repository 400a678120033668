//! End-to-end engine runs against scripted collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use fleet_common::{
    AgentDescriptor, ChatRole, ConversationEntry, FleetError, OrchestratorConfig, Result,
};
use fleet_generation::{GenerationResult, ModelDescriptor};
use fleet_orchestrator::{
    AgentExecutor, DocumentIndex, DocumentSnippet, EventSink, HistoryStore, MediaGenerator,
    MediaRequest, OrchestrationEngine, OrchestrationEvent, Roster,
};

// ── scripted collaborators ───────────────────────────────────

/// Pops pre-seeded replies per agent; records every call.
#[derive(Default)]
struct ScriptedExecutor {
    replies: Mutex<HashMap<u32, Vec<std::result::Result<String, String>>>>,
    calls: Mutex<Vec<(u32, String)>>,
}

impl ScriptedExecutor {
    fn reply(&self, agent_id: u32, response: &str) {
        self.replies
            .lock()
            .unwrap()
            .entry(agent_id)
            .or_default()
            .push(Ok(response.to_string()));
    }

    fn fail(&self, agent_id: u32, error: &str) {
        self.replies
            .lock()
            .unwrap()
            .entry(agent_id)
            .or_default()
            .push(Err(error.to_string()));
    }

    fn calls(&self) -> Vec<(u32, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentExecutor for ScriptedExecutor {
    async fn exec(&self, agent_id: u32, text: &str, _timeout: Duration) -> Result<String> {
        self.calls.lock().unwrap().push((agent_id, text.to_string()));
        let mut replies = self.replies.lock().unwrap();
        let queue = replies
            .get_mut(&agent_id)
            .ok_or_else(|| FleetError::AgentNotAvailable(agent_id.to_string()))?;
        if queue.is_empty() {
            return Err(FleetError::AgentNotAvailable(agent_id.to_string()));
        }
        queue.remove(0).map_err(FleetError::transport)
    }
}

#[derive(Default)]
struct MemoryHistory {
    entries: Mutex<HashMap<u32, Vec<ConversationEntry>>>,
}

impl MemoryHistory {
    fn seed(&self, agent_id: u32, role: ChatRole, content: &str) {
        self.entries
            .lock()
            .unwrap()
            .entry(agent_id)
            .or_default()
            .push(ConversationEntry::now(role, content));
    }

    fn log(&self, agent_id: u32) -> Vec<ConversationEntry> {
        self.entries
            .lock()
            .unwrap()
            .get(&agent_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn append(&self, agent_id: u32, entry: ConversationEntry) -> Result<()> {
        self.entries.lock().unwrap().entry(agent_id).or_default().push(entry);
        Ok(())
    }

    async fn recent(&self, agent_id: u32, limit: usize) -> Result<Vec<ConversationEntry>> {
        let entries = self.log(agent_id);
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.into_iter().skip(skip).collect())
    }
}

struct NoDocuments;

#[async_trait]
impl DocumentIndex for NoDocuments {
    async fn search(
        &self,
        _agent_id: u32,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<DocumentSnippet>> {
        Ok(Vec::new())
    }
}

struct ScriptedGenerator {
    configured: bool,
    models: Vec<ModelDescriptor>,
    output_url: Option<String>,
    requests: Mutex<Vec<MediaRequest>>,
}

impl ScriptedGenerator {
    fn new(models: Vec<ModelDescriptor>, output_url: Option<&str>) -> Self {
        Self {
            configured: true,
            models,
            output_url: output_url.map(str::to_string),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<MediaRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaGenerator for ScriptedGenerator {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn suggest(&self, _task_type: &str, count: usize) -> Result<Vec<ModelDescriptor>> {
        Ok(self.models.iter().take(count).cloned().collect())
    }

    async fn generate(&self, request: &MediaRequest) -> Result<GenerationResult> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(GenerationResult {
            status: if self.output_url.is_some() {
                "task_postprocess_end".to_string()
            } else {
                "task_cancel".to_string()
            },
            success: self.output_url.is_some(),
            task_id: Some("42".to_string()),
            output_url: self.output_url.clone(),
            outputs: Vec::new(),
            message: None,
            model_used: Some("FastGen".to_string()),
            model_owner: Some("google".to_string()),
            model_project: Some("fastgen".to_string()),
            elapsed: Some(2.5),
        })
    }
}

// ── harness ──────────────────────────────────────────────────

fn model(owner: &str, project: &str, name: &str) -> ModelDescriptor {
    ModelDescriptor {
        owner: owner.to_string(),
        project: project.to_string(),
        name: name.to_string(),
        description: "a model".to_string(),
        cost: "$0.01".to_string(),
        cost_unit: "image".to_string(),
        avg_duration: "4s".to_string(),
        runs: 20_000,
        tags: vec!["fast-inference".to_string()],
        catalog_id: format!("{owner}-{project}"),
        score: 0,
    }
}

fn roster() -> Roster {
    Roster {
        agents: vec![
            AgentDescriptor {
                id: 1,
                name: "Lead".to_string(),
                role: "Orchestrator".to_string(),
                emoji: "🧠".to_string(),
                online: true,
            },
            AgentDescriptor {
                id: 2,
                name: "Scout".to_string(),
                role: "Research Analyst".to_string(),
                emoji: "🔎".to_string(),
                online: true,
            },
            AgentDescriptor {
                id: 3,
                name: "Quill".to_string(),
                role: "Writer".to_string(),
                emoji: "✍️".to_string(),
                online: true,
            },
        ],
        orchestrator_id: 1,
    }
}

struct Harness {
    engine: OrchestrationEngine,
    executor: Arc<ScriptedExecutor>,
    history: Arc<MemoryHistory>,
    generator: Arc<ScriptedGenerator>,
}

fn harness(generator: ScriptedGenerator) -> Harness {
    let executor = Arc::new(ScriptedExecutor::default());
    let history = Arc::new(MemoryHistory::default());
    let generator = Arc::new(generator);
    let engine = OrchestrationEngine::new(
        roster(),
        executor.clone(),
        history.clone(),
        Arc::new(NoDocuments),
        generator.clone(),
        OrchestratorConfig::default(),
    );
    Harness { engine, executor, history, generator }
}

async fn run(harness: &Harness, message: &str) -> Vec<OrchestrationEvent> {
    let (sink, rx) = EventSink::channel();
    harness.engine.run(message, &sink).await;
    drop(sink);
    collect(rx)
}

fn collect(mut rx: mpsc::UnboundedReceiver<OrchestrationEvent>) -> Vec<OrchestrationEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn names(events: &[OrchestrationEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.name()).collect()
}

fn done_response(events: &[OrchestrationEvent]) -> String {
    events
        .iter()
        .find_map(|e| match e {
            OrchestrationEvent::Done { response, .. } => Some(response.clone()),
            _ => None,
        })
        .expect("done event")
}

// ── scenarios ────────────────────────────────────────────────

#[tokio::test]
async fn direct_plan_answers_without_delegating() {
    let h = harness(ScriptedGenerator::new(vec![], None));
    h.executor.reply(1, r#"{"plan":"direct","delegations":[],"direct_answer":"Paris"}"#);

    let events = run(&h, "capital of France?").await;
    assert_eq!(names(&events), vec!["phase", "plan", "done", "close"]);
    assert_eq!(done_response(&events), "Paris");

    let log = h.history.log(1);
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].role, ChatRole::User);
    assert_eq!(log[1].content, "Paris");
}

#[tokio::test]
async fn empty_message_is_an_immediate_error() {
    let h = harness(ScriptedGenerator::new(vec![], None));
    let events = run(&h, "   ").await;
    assert_eq!(names(&events), vec!["error", "close"]);
    assert!(h.executor.calls().is_empty());
}

#[tokio::test]
async fn bare_numeral_selects_from_marker_without_analysis() {
    let h = harness(ScriptedGenerator::new(vec![], Some("https://cdn.example.ai/out.png")));
    h.history.seed(
        1,
        ChatRole::Assistant,
        "<!-- model_options: [{\"owner\":\"google\",\"project\":\"fastgen\",\"name\":\"FastGen\"}] -->\n\
         <!-- media_prompt: a red fox -->\n\
         <!-- media_task_type: text-to-image -->\n\
         Pick a model:",
    );

    let events = run(&h, "1").await;
    // No analysis round-trip at all.
    assert!(h.executor.calls().is_empty());
    assert_eq!(names(&events), vec!["phase", "done", "close"]);
    match &events[0] {
        OrchestrationEvent::Phase { phase, .. } => assert_eq!(phase, "generating"),
        other => panic!("expected phase event, got {}", other.name()),
    }

    let requests = h.generator.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].prompt, "a red fox");
    assert_eq!(requests[0].model.as_deref(), Some("google/fastgen"));

    let answer = done_response(&events);
    assert!(answer.contains("FastGen"));
    assert!(answer.contains("https://cdn.example.ai/out.png"));
}

#[tokio::test]
async fn out_of_range_numeral_falls_back_to_analysis() {
    let h = harness(ScriptedGenerator::new(vec![], None));
    h.history.seed(
        1,
        ChatRole::Assistant,
        "<!-- model_options: [{\"owner\":\"google\",\"project\":\"fastgen\",\"name\":\"FastGen\"}] -->\n\
         Pick a model:",
    );
    h.executor.reply(1, r#"{"plan":"direct","delegations":[],"direct_answer":"ok"}"#);

    let events = run(&h, "3").await;
    assert_eq!(done_response(&events), "ok");
    // The numeral went through normal analysis.
    assert_eq!(h.executor.calls().len(), 1);
}

#[tokio::test]
async fn invalid_delegations_are_skipped() {
    let h = harness(ScriptedGenerator::new(vec![], None));
    // Targets: self, out-of-range, empty task, then one valid.
    h.executor.reply(
        1,
        r#"{"plan":"split","delegations":[
            {"agent_id":1,"task":"introspect"},
            {"agent_id":99,"task":"impossible"},
            {"agent_id":3,"task":"   "},
            {"agent_id":2,"task":"find sources"}
        ]}"#,
    );
    h.executor.reply(2, "three sources found");
    h.executor.reply(1, "Summary: three sources found");

    let events = run(&h, "research this").await;
    assert_eq!(
        names(&events),
        vec!["phase", "plan", "delegating", "agent_done", "combining", "done", "close"]
    );

    let chain = events
        .iter()
        .find_map(|e| match e {
            OrchestrationEvent::Done { chain, .. } => Some(chain.clone()),
            _ => None,
        })
        .expect("done event");
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].agent_id, 2);
    assert_eq!(chain[0].response, "three sources found");
    assert_eq!(done_response(&events), "Summary: three sources found");

    // The exchange is recorded in both agents' logs.
    let delegation_entries = |id: u32| {
        h.history
            .log(id)
            .into_iter()
            .filter(|e| e.role == ChatRole::Delegation)
            .count()
    };
    assert_eq!(delegation_entries(2), 1);
    assert_eq!(delegation_entries(1), 1);
}

#[tokio::test]
async fn combine_failure_concatenates_responses() {
    let h = harness(ScriptedGenerator::new(vec![], None));
    h.executor.reply(
        1,
        r#"{"plan":"split","delegations":[{"agent_id":2,"task":"research"},{"agent_id":3,"task":"write"}]}"#,
    );
    h.executor.reply(2, "facts");
    h.executor.reply(3, "prose");
    h.executor.fail(1, "combine model unavailable");

    let events = run(&h, "do both").await;
    let answer = done_response(&events);
    assert!(answer.contains("### Scout (Research Analyst)\nfacts"));
    assert!(answer.contains("### Quill (Writer)\nprose"));
}

#[tokio::test]
async fn failed_delegation_is_recorded_inline() {
    let h = harness(ScriptedGenerator::new(vec![], None));
    h.executor.reply(1, r#"{"plan":"split","delegations":[{"agent_id":2,"task":"research"}]}"#);
    h.executor.fail(2, "container stopped");
    h.executor.reply(1, "combined anyway");

    let events = run(&h, "research this").await;
    let chain = events
        .iter()
        .find_map(|e| match e {
            OrchestrationEvent::Done { chain, .. } => Some(chain.clone()),
            _ => None,
        })
        .expect("done event");
    assert_eq!(chain.len(), 1);
    assert!(chain[0].response.contains("Agent 2 error"));
}

#[tokio::test]
async fn unparsed_plan_routes_to_direct() {
    let h = harness(ScriptedGenerator::new(vec![], None));
    h.executor.reply(1, "I think you should just relax.");
    h.executor.reply(1, "Sure, relaxing it is.");

    let events = run(&h, "what now?").await;
    assert_eq!(names(&events), vec!["phase", "phase", "done", "close"]);
    match &events[1] {
        OrchestrationEvent::Phase { phase, .. } => assert_eq!(phase, "direct"),
        other => panic!("expected phase event, got {}", other.name()),
    }
    assert_eq!(done_response(&events), "Sure, relaxing it is.");
}

#[tokio::test]
async fn analysis_failure_falls_back_then_errors() {
    let h = harness(ScriptedGenerator::new(vec![], None));
    h.executor.fail(1, "exec timed out");
    h.executor.reply(1, "fallback answer");

    let events = run(&h, "hello").await;
    assert_eq!(done_response(&events), "fallback answer");

    // Both calls failing is the only terminal error path.
    let h = harness(ScriptedGenerator::new(vec![], None));
    h.executor.fail(1, "exec timed out");
    h.executor.fail(1, "exec timed out again");
    let events = run(&h, "hello").await;
    assert_eq!(names(&events), vec!["phase", "phase", "error", "close"]);
}

#[tokio::test]
async fn suggest_plan_lists_models_and_tags_history() {
    let h = harness(ScriptedGenerator::new(
        vec![model("google", "fastgen", "FastGen"), model("acme", "slowgen", "SlowGen")],
        None,
    ));
    h.executor.reply(
        1,
        r#"{"plan":"suggest models","delegations":[],"direct_answer":null,"suggest_media":{"prompt":"a red fox","task_type":"text-to-image"}}"#,
    );

    let events = run(&h, "draw me a fox").await;
    let answer = done_response(&events);
    assert!(answer.contains("**1. FastGen**"));
    assert!(answer.contains("**2. SlowGen**"));
    assert!(answer.contains("reply with the number"));
    // The marker is stored, not shown.
    assert!(!answer.contains("model_options"));
    let log = h.history.log(1);
    assert!(log.last().unwrap().content.contains("model_options"));
    assert!(log.last().unwrap().content.contains("media_prompt: a red fox"));
}

#[tokio::test]
async fn generate_plan_upgrades_image_to_video() {
    let h = harness(ScriptedGenerator::new(vec![], Some("https://cdn.example.ai/clip.mp4")));
    h.history.seed(1, ChatRole::Assistant, "here: https://cdn.example.ai/fox.png");
    h.executor.reply(
        1,
        r#"{"plan":"generate","delegations":[],"generate_media":{"prompt":"the fox runs","task_type":"text-to-image","model":"google/fastgen"}}"#,
    );

    let events = run(&h, "animate that picture into a video").await;
    let requests = h.generator.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].task_type, "image-to-video");
    assert_eq!(requests[0].input_media.as_deref(), Some("https://cdn.example.ai/fox.png"));
    assert!(done_response(&events).contains("https://cdn.example.ai/clip.mp4"));
}

#[tokio::test]
async fn generation_failure_is_a_done_answer_not_an_error() {
    let h = harness(ScriptedGenerator::new(vec![], None));
    h.executor.reply(
        1,
        r#"{"plan":"generate","delegations":[],"generate_media":{"prompt":"a fox","model":"google/fastgen"}}"#,
    );

    let events = run(&h, "make the fox").await;
    assert_eq!(names(&events).last(), Some(&"close"));
    assert!(names(&events).contains(&"done"));
    assert!(done_response(&events).contains("Generation failed"));
}

#[tokio::test]
async fn unconfigured_generator_reports_setup_needed() {
    let mut generator = ScriptedGenerator::new(vec![], None);
    generator.configured = false;
    let h = harness(generator);
    h.executor.reply(
        1,
        r#"{"plan":"suggest models","delegations":[],"suggest_media":{"prompt":"a fox","task_type":"text-to-image"}}"#,
    );

    let events = run(&h, "draw a fox").await;
    assert!(done_response(&events).contains("not configured"));
    assert!(h.generator.requests().is_empty());

    // The exchange still lands in the conversation log.
    let log = h.history.log(1);
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].content, "draw a fox");
    assert!(log[1].content.contains("not configured"));
}

#[tokio::test]
async fn terminal_done_paths_persist_the_exchange() {
    // Empty catalog: the "no models" answer is logged like any other.
    let h = harness(ScriptedGenerator::new(vec![], None));
    h.executor.reply(
        1,
        r#"{"plan":"suggest models","delegations":[],"suggest_media":{"prompt":"a fox","task_type":"text-to-image"}}"#,
    );
    let events = run(&h, "draw a fox").await;
    assert!(done_response(&events).contains("No models found"));
    let log = h.history.log(1);
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].role, ChatRole::User);
    assert!(log[1].content.contains("No models found"));

    // Unconfigured generator on the generate branch, same guarantee.
    let mut generator = ScriptedGenerator::new(vec![], None);
    generator.configured = false;
    let h = harness(generator);
    h.executor.reply(
        1,
        r#"{"plan":"generate","delegations":[],"generate_media":{"prompt":"a fox","model":"google/fastgen"}}"#,
    );
    let events = run(&h, "make the fox").await;
    assert!(done_response(&events).contains("not configured"));
    let log = h.history.log(1);
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].content, "make the fox");
    assert!(log[1].content.contains("not configured"));
}
