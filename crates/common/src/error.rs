use thiserror::Error;

/// Error taxonomy for the control plane.
///
/// Recoverable parse failures (`PlanParse`, `SchemaParse`) trigger fallback
/// paths; transport and timeout failures are surfaced per-step and never
/// abort sibling steps.
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Plan parse error: {0}")]
    PlanParse(String),

    #[error("Schema parse error: {0}")]
    SchemaParse(String),

    #[error("No model found for '{0}'")]
    ModelDiscovery(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Agent not available: {0}")]
    AgentNotAvailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("History error: {0}")]
    History(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FleetError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn history(msg: impl Into<String>) -> Self {
        Self::History(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;
