//! The orchestration endpoint: one POST, one SSE stream of progress
//! events ending in `done`/`error` + `close`.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::Deserialize;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::info;
use uuid::Uuid;

use fleet_orchestrator::{EventSink, OrchestrationEvent};

use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct OrchestrateRequest {
    /// The user's message. "task" is accepted as an alias for older
    /// clients.
    #[serde(alias = "task")]
    pub message: String,
}

pub async fn orchestrate(
    State(state): State<AppState>,
    Json(request): Json<OrchestrateRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let run_id = Uuid::new_v4();
    info!(%run_id, "orchestration run accepted");

    let (sink, rx) = EventSink::channel();
    let engine = state.engine.clone();
    // The run continues server-side even if the client disconnects; the
    // sink silently drops events with no consumer.
    tokio::spawn(async move {
        engine.run(&request.message, &sink).await;
        info!(%run_id, "orchestration run finished");
    });

    let stream = UnboundedReceiverStream::new(rx).map(|event| Ok(to_sse_frame(&event)));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse_frame(event: &OrchestrationEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.payload().to_string())
}
