//! HTTP handlers for the status API

use axum::{extract::State, response::Html, Json};
use tracing::instrument;

use crate::controller::GateStateStore;

use super::dto::{GateListResponse, HealthResponse};
use super::page::render_status_page;

/// Health check endpoint
#[instrument]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// HTML overview of every gate
#[instrument(skip(store))]
pub async fn index(State(store): State<GateStateStore>) -> Html<String> {
    Html(render_status_page(&store.snapshot().await))
}

/// List the latest status of every gate
#[instrument(skip(store))]
pub async fn list_gates(State(store): State<GateStateStore>) -> Json<GateListResponse> {
    let items = store.snapshot().await;
    let total = items.len();
    Json(GateListResponse { items, total })
}
