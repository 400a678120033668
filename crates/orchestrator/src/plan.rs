//! Plan interpretation: turn an orchestrator agent's raw planning reply
//! into an executable plan.
//!
//! The producer is a free-text generator whose output format is not
//! guaranteed, so interpretation degrades gracefully: strict parse first,
//! then a fenced code block, then the first embedded object carrying a
//! plan signature key. All three failing is an answer (`None`), never a
//! panic.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Keys that identify an embedded JSON object as a plan.
const SIGNATURE_KEYS: [&str; 3] = ["\"plan\"", "\"delegations\"", "\"direct_answer\""];

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fence regex"));

/// A sub-task routed to another agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delegation {
    #[serde(default)]
    pub agent_id: i64,
    #[serde(default)]
    pub task: String,
}

/// Request for a media suggestion or generation step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_task_type")]
    pub task_type: String,
    /// Explicit "owner/project" reference, when the user already chose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_media: Option<String>,
}

fn default_task_type() -> String {
    "text-to-image".to_string()
}

/// Structured routing decision produced once per orchestration run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub delegations: Vec<Delegation>,
    #[serde(default)]
    pub direct_answer: Option<String>,
    #[serde(default)]
    pub suggest_media: Option<MediaRequest>,
    #[serde(default)]
    pub generate_media: Option<MediaRequest>,
}

/// The branch a plan routes to. Pure data, so the phase machine can be
/// driven without I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum Branch {
    Suggest,
    Direct,
    Generate,
    Delegate,
}

impl Plan {
    /// Branch precedence: suggestion, then a pure direct answer, then
    /// generation, then delegation (possibly with an empty list).
    pub fn branch(&self) -> Branch {
        if self.suggest_media.is_some() {
            return Branch::Suggest;
        }
        if self.direct_answer.is_some()
            && self.delegations.is_empty()
            && self.generate_media.is_none()
        {
            return Branch::Direct;
        }
        if self.generate_media.is_some() {
            return Branch::Generate;
        }
        Branch::Delegate
    }

    pub fn summary(&self, fallback: &str) -> String {
        if self.plan.is_empty() {
            fallback.to_string()
        } else {
            self.plan.clone()
        }
    }
}

fn parse_plan(candidate: &str) -> Option<Plan> {
    serde_json::from_str::<Plan>(candidate).ok()
}

/// Interpret a raw planning reply. Returns `None` when no stage produced
/// a plan; never fails harder than that.
pub fn interpret(raw: &str) -> Option<Plan> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Stage 1: the whole reply is the plan.
    if let Some(plan) = parse_plan(trimmed) {
        return Some(plan);
    }

    // Stage 2: a fenced code block holds the plan.
    if let Some(captures) = FENCED_BLOCK.captures(trimmed) {
        if let Some(plan) = parse_plan(captures.get(1).map_or("", |m| m.as_str())) {
            return Some(plan);
        }
    }

    // Stage 3: the first brace-delimited span carrying a signature key.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    let span = &trimmed[start..=end];
    if SIGNATURE_KEYS.iter().any(|key| span.contains(key)) {
        return parse_plan(span);
    }

    None
}
