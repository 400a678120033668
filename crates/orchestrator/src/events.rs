//! Ordered progress events for one orchestration run.
//!
//! Events are delivered to exactly one consumer, in emission order, with
//! no buffering gaps. Exactly one of `done`/`error` occurs per run and is
//! always immediately followed by `close`.

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;

/// One completed (or failed) delegation step.
#[derive(Debug, Clone, Serialize)]
pub struct DelegationStep {
    pub agent_id: u32,
    pub agent_name: String,
    pub agent_emoji: String,
    pub role: String,
    pub task: String,
    pub response: String,
}

/// A delegation as announced in the `plan` event, before execution.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedDelegation {
    pub agent_id: i64,
    pub task: String,
    pub agent_name: String,
    pub agent_emoji: String,
}

#[derive(Debug, Clone)]
pub enum OrchestrationEvent {
    Phase { phase: String, message: String },
    Plan { plan: String, delegations: Vec<PlannedDelegation> },
    Delegating(DelegationStep),
    AgentDone(DelegationStep),
    Combining { message: String },
    Done { response: String, chain: Vec<DelegationStep>, plan: String },
    Error { error: String },
    Close,
}

impl OrchestrationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Phase { .. } => "phase",
            Self::Plan { .. } => "plan",
            Self::Delegating(_) => "delegating",
            Self::AgentDone(_) => "agent_done",
            Self::Combining { .. } => "combining",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
            Self::Close => "close",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::Phase { phase, message } => json!({ "phase": phase, "message": message }),
            Self::Plan { plan, delegations } => {
                json!({ "plan": plan, "delegations": delegations })
            }
            Self::Delegating(step) => json!({
                "agent_id": step.agent_id,
                "agent_name": step.agent_name,
                "agent_emoji": step.agent_emoji,
                "role": step.role,
                "task": step.task,
            }),
            Self::AgentDone(step) => serde_json::to_value(step).unwrap_or_default(),
            Self::Combining { message } => json!({ "message": message }),
            Self::Done { response, chain, plan } => {
                json!({ "response": response, "chain": chain, "plan": plan })
            }
            Self::Error { error } => json!({ "error": error }),
            Self::Close => json!({}),
        }
    }
}

/// Emitter side of the event stream. Send errors are ignored: a
/// disconnected consumer stops receiving, the run continues server-side.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<OrchestrationEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<OrchestrationEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OrchestrationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: OrchestrationEvent) {
        debug!("event: {}", event.name());
        let _ = self.tx.send(event);
    }

    pub fn phase(&self, phase: &str, message: impl Into<String>) {
        self.emit(OrchestrationEvent::Phase {
            phase: phase.to_string(),
            message: message.into(),
        });
    }

    /// Terminal success: `done` then `close`.
    pub fn done(&self, response: impl Into<String>, chain: Vec<DelegationStep>, plan: impl Into<String>) {
        self.emit(OrchestrationEvent::Done {
            response: response.into(),
            chain,
            plan: plan.into(),
        });
        self.emit(OrchestrationEvent::Close);
    }

    /// Terminal failure: `error` then `close`.
    pub fn error(&self, error: impl Into<String>) {
        self.emit(OrchestrationEvent::Error { error: error.into() });
        self.emit(OrchestrationEvent::Close);
    }
}
