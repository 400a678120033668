//! Multi-agent orchestration: plan interpretation, the phase state
//! machine, and the progress event stream.

pub mod collaborators;
pub mod engine;
pub mod events;
pub mod plan;
pub mod prompts;

pub use collaborators::{AgentExecutor, DocumentIndex, DocumentSnippet, HistoryStore, MediaGenerator, Roster};
pub use engine::OrchestrationEngine;
pub use events::{DelegationStep, EventSink, OrchestrationEvent, PlannedDelegation};
pub use plan::{interpret, Branch, Delegation, MediaRequest, Plan};
