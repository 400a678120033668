//! HTTP API for the agent fleet: the orchestration SSE endpoint plus the
//! production collaborator implementations (container exec, JSONL
//! history, document search).

pub mod documents;
pub mod exec;
pub mod history;
pub mod routes;
pub mod server;

pub use documents::NoopDocumentIndex;
pub use exec::DockerAgentExecutor;
pub use history::JsonlHistoryStore;
pub use server::{build_engine, router, serve, AppState};
