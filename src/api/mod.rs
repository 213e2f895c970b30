//! HTTP API server for switchboard gateway

pub mod devices;
pub mod health;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{Config, DEFAULT_MAX_BODY_BYTES};
use crate::notify::{NotifyState, TelemetryPublisher, notify_middleware};
use crate::proxy::Dispatcher;
use crate::registry::DeviceRegistry;
use crate::{Error, Result};

/// Error body returned for every failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Reason phrase of the HTTP status (e.g. `"Bad Request"`)
    pub status: String,
    /// Human-readable cause
    pub message: String,
}

impl ErrorResponse {
    /// Build an error body for `status`
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.canonical_reason().unwrap_or_default().to_string(),
            message: message.into(),
        }
    }
}

/// Map a crate error to its HTTP reply
pub fn error_reply(error: &Error) -> (StatusCode, Json<ErrorResponse>) {
    let status = error.status_code();
    (status, Json(ErrorResponse::new(status, error.to_string())))
}

/// Shared state for API handlers
#[derive(Debug, Clone)]
pub struct ApiState {
    pub registry: DeviceRegistry,
    pub dispatcher: Dispatcher,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    registry: DeviceRegistry,
    addr: String,
    publisher: Option<TelemetryPublisher>,
    backend_timeout: Option<Duration>,
    max_body_bytes: usize,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(registry: DeviceRegistry) -> Self {
        Self {
            registry,
            addr: "0.0.0.0:8080".to_string(),
            publisher: None,
            backend_timeout: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Create a builder with every component taken from `config`
    ///
    /// # Errors
    ///
    /// Returns error if the telemetry HTTP client cannot be built
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = DeviceRegistry::from_config(&config.registry);
        let publisher = TelemetryPublisher::from_config(&config.telemetry)?;

        Ok(Self::new(registry)
            .addr(config.listen_addr())
            .publisher(publisher)
            .backend_timeout(config.server.backend_timeout)
            .max_body_bytes(config.server.max_body_bytes))
    }

    /// Set the listen address
    #[must_use]
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    /// Set the telemetry publisher; `None` disables switch notifications
    #[must_use]
    pub fn publisher(mut self, publisher: Option<TelemetryPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Set an overall timeout for forwarded requests
    #[must_use]
    pub const fn backend_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.backend_timeout = timeout;
        self
    }

    /// Set the largest request body buffered for switch inspection
    #[must_use]
    pub const fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Build the API server
    ///
    /// # Errors
    ///
    /// Returns error if the backend HTTP client cannot be built
    pub fn build(self) -> Result<ApiServer> {
        let dispatcher = Dispatcher::build(self.registry.clone(), self.backend_timeout)?;

        if self.publisher.is_none() {
            tracing::info!("no telemetry sender, switch notifications disabled");
        }

        let state = Arc::new(ApiState {
            registry: self.registry,
            dispatcher,
        });

        Ok(ApiServer {
            state,
            notify: NotifyState::new(self.publisher, self.max_body_bytes),
            addr: self.addr,
        })
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    notify: NotifyState,
    addr: String,
}

impl ApiServer {
    /// Build the router with all routes
    ///
    /// Switch notification runs on every request, before routing.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(health::router())
            .merge(devices::router(self.state.clone()))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(axum::middleware::from_fn_with_state(
                        self.notify.clone(),
                        notify_middleware,
                    )),
            )
    }

    /// Serve on an already-bound listener until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if the server fails while running
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        tracing::info!(
            addr = %local,
            registry = %self.state.registry.describe(),
            notifications = self.notify.is_enabled(),
            "API server listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        tracing::info!("API server stopped");
        Ok(())
    }

    /// Bind the configured address and run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|e| {
                Error::Config(format!("failed to bind API server on {}: {e}", self.addr))
            })?;
        self.serve(listener).await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
