//! Generation-task lifecycle: submitted → polling → terminal.

use serde::{Deserialize, Serialize};

use crate::transport::TaskOutput;

/// Remote status marking a finished task.
pub const TERMINAL_STATUSES: [&str; 2] = ["task_postprocess_end", "task_cancel"];
/// Subset of terminal statuses that count as success.
pub const SUCCESS_STATUS: &str = "task_postprocess_end";

pub fn is_terminal_status(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

/// Task lifecycle state. Transitions are monotone; terminal states are
/// absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Submitted,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }

    /// Advance on a remote status report. Non-terminal statuses move a
    /// submitted task into polling; terminal local states never change.
    pub fn on_status(self, status: &str) -> Self {
        if self.is_terminal() {
            return self;
        }
        match status {
            s if s == SUCCESS_STATUS => Self::Succeeded,
            s if is_terminal_status(s) => Self::Failed,
            _ => Self::Polling,
        }
    }

    /// Advance on deadline expiry. A no-op once terminal.
    pub fn on_deadline(self) -> Self {
        if self.is_terminal() {
            return self;
        }
        Self::TimedOut
    }
}

/// A submitted generation job and everything learned about it so far.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationTask {
    pub task_id: String,
    pub owner: String,
    pub project: String,
    pub params: Vec<(String, String)>,
    pub state: TaskState,
    pub status: String,
    pub outputs: Vec<TaskOutput>,
    pub elapsed: Option<f64>,
}

impl GenerationTask {
    pub fn submitted(
        task_id: String,
        owner: String,
        project: String,
        params: Vec<(String, String)>,
    ) -> Self {
        Self {
            task_id,
            owner,
            project,
            params,
            state: TaskState::Submitted,
            status: String::new(),
            outputs: Vec::new(),
            elapsed: None,
        }
    }

    /// Record a remote status report. Terminal tasks ignore further
    /// reports entirely.
    pub fn observe(&mut self, status: &str, outputs: Vec<TaskOutput>, elapsed: Option<f64>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = self.state.on_status(status);
        self.status = status.to_string();
        if self.state.is_terminal() {
            self.outputs = outputs;
            self.elapsed = elapsed;
        }
    }

    pub fn output_url(&self) -> Option<String> {
        self.outputs.first().map(|o| o.url.clone()).filter(|u| !u.is_empty())
    }
}
