//! HTTP surface: router construction and collaborator wiring.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use fleet_common::SystemConfig;
use fleet_generation::GenerationGateway;
use fleet_orchestrator::{OrchestrationEngine, Roster};

use crate::documents::NoopDocumentIndex;
use crate::exec::DockerAgentExecutor;
use crate::history::JsonlHistoryStore;
use crate::routes;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<OrchestrationEngine>,
}

/// Wire the production collaborators into an engine.
pub fn build_engine(config: &SystemConfig) -> anyhow::Result<OrchestrationEngine> {
    let roster = Roster {
        agents: config.orchestrator.agents.clone(),
        orchestrator_id: config.orchestrator.orchestrator_id,
    };
    let executor = Arc::new(DockerAgentExecutor::new(&config.server));
    let history = Arc::new(JsonlHistoryStore::new(config.server.data_dir.clone()));
    let generator = Arc::new(GenerationGateway::new(config.generation.clone())?);
    Ok(OrchestrationEngine::new(
        roster,
        executor,
        history,
        Arc::new(NoopDocumentIndex),
        generator,
        config.orchestrator.clone(),
    ))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::roster::health))
        .route("/api/agents/roster", get(routes::roster::roster))
        .route("/api/agents/orchestrate", post(routes::orchestrate::orchestrate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(config: SystemConfig, bind_override: Option<String>) -> anyhow::Result<()> {
    let addr = bind_override.unwrap_or_else(|| config.server.bind_addr.clone());
    let engine = Arc::new(build_engine(&config)?);
    let app = router(AppState { engine });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
