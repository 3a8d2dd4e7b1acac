//! Public instance identification and metrics exposition.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::AppState;
use crate::config::Configuration;

/// Structured configuration.
#[derive(Debug, Serialize)]
pub struct Status {
    name: String,
    url: String,
    version: String,
}

/// Public server status.
pub async fn status(State(config): State<Arc<Configuration>>) -> Json<Status> {
    Json(Status {
        name: config.name.clone(),
        url: config.url.clone(),
        version: config.version().to_owned(),
    })
}

/// Prometheus text exposition, 404 when no recorder is installed.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
