//! Request inspection middleware
//!
//! Buffers each request body, hands an identical copy downstream, and
//! publishes a switch state event when the request is a switch command.

use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};

use super::{TelemetryPublisher, switch_event};
use crate::api::ErrorResponse;

/// Shared state for [`notify_middleware`]
#[derive(Debug, Clone)]
pub struct NotifyState {
    publisher: Option<Arc<TelemetryPublisher>>,
    max_body_bytes: usize,
}

impl NotifyState {
    /// Create middleware state; `None` disables publishing
    #[must_use]
    pub fn new(publisher: Option<TelemetryPublisher>, max_body_bytes: usize) -> Self {
        Self {
            publisher: publisher.map(Arc::new),
            max_body_bytes,
        }
    }

    /// Whether events will be published
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.publisher.is_some()
    }
}

fn declared_length(request: &Request) -> Option<usize> {
    request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Inspect every request for switch commands before routing
///
/// The body is restored unconsumed. A publish failure is logged and the
/// request continues as if nothing happened.
pub async fn notify_middleware(
    State(state): State<NotifyState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(publisher) = state.publisher.clone() else {
        return next.run(request).await;
    };

    if declared_length(&request).is_some_and(|len| len > state.max_body_bytes) {
        tracing::debug!("request body over inspection limit, skipping");
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let limited = Limited::new(body, state.max_body_bytes);
    let bytes = match limited.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            // the body is gone at this point, so the request can't continue
            let status = if e.is::<LengthLimitError>() {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            tracing::warn!(error = %e, "failed to buffer request body");
            let reply = ErrorResponse::new(status, e.to_string());
            return (status, Json(reply)).into_response();
        }
    };

    if let Some(event) = switch_event(parts.uri.path(), &bytes) {
        tracing::info!(payload = %event.payload, "switch command, publishing telemetry");
        if let Err(e) = publisher.publish(&event).await {
            tracing::warn!(
                error = %e,
                url = %publisher.publish_url(),
                "error sending telemetry"
            );
        }
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    next.run(request).await
}
