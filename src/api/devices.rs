//! Device inventory and proxy endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use super::{ApiState, ErrorResponse, error_reply};
use crate::Error;
use crate::proxy::split_device_path;
use crate::registry::Registry;

/// List every device in the registry, enabled or not
async fn list_devices(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Registry>, (StatusCode, Json<ErrorResponse>)> {
    let registry = state.registry.list_devices().await.map_err(|e| {
        tracing::error!(error = %e, "failed to list devices");
        error_reply(&e)
    })?;

    Ok(Json(Registry::clone(&registry)))
}

/// Forward a request to the device's backend
///
/// The id and remainder are read from the raw request path, the same bytes
/// switch telemetry reports, so an escaped id is looked up as sent.
async fn forward(State(state): State<Arc<ApiState>>, request: Request) -> Response {
    let Some((id, remainder)) = split_device_path(request.uri().path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let (id, remainder) = (id.to_string(), remainder.to_string());

    let result = state.dispatcher.dispatch(&id, request, &remainder).await;
    match result {
        Ok(response) => response,
        Err(e) => {
            match &e {
                Error::NotFound(_) | Error::Disabled(_) => {
                    tracing::info!(device_id = %id, error = %e, "request rejected");
                }
                _ => tracing::error!(device_id = %id, error = %e, "proxy failed"),
            }
            error_reply(&e).into_response()
        }
    }
}

/// Build the devices router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/devices", get(list_devices))
        .route("/device/{id}/", post(forward))
        .route("/device/{id}/{*path}", post(forward))
        .with_state(state)
}
