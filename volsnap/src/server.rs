//! HTTP transport for the snapshot RPC calls
//!
//! - **`POST /v1/snapshot/create`** - body `{"volume", "snapname", "version"}`
//! - **`POST /v1/snapshot/delete`** - same body
//! - **`GET /health/live`** - liveness probe
//!
//! The response body of both snapshot calls is always the encoded status
//! object, `{"response": "..."}`. The HTTP status tells the outcome class:
//! 200 when the storage target answered (`OK` or a rejection), 400 for an
//! invalid request, 502 when the control channel failed and 504 when the
//! total budget ran out. The HTTP timeout backstop also answers 504 with the
//! `ERR` envelope.

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use volsnap_common::Signal;

use crate::{
    SnapshotError,
    rpc::{
        CommandStatus, RpcError, SnapshotCreateRequest, SnapshotDeleteRequest, SnapshotResponse,
        SnapshotRpcHandler,
    },
};

/// Slack on top of the total budget before the HTTP layer gives up on a request
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

/// Configuration for the RPC server
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// Address to bind the RPC server
    ///
    /// Common values:
    /// - `[::]:7777` (IPv6 any address)
    /// - `0.0.0.0:7777` (IPv4 any address)
    /// - `127.0.0.1:7777` (localhost only)
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

fn default_listen_address() -> String {
    "[::]:7777".to_string()
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
        }
    }
}

/// Errors that can occur while running the RPC server
#[derive(Debug, Error)]
pub enum RpcServerError {
    /// Failed to bind to the specified address
    #[error("Failed to bind RPC server to {address}: {source}")]
    BindError {
        address: String,
        source: std::io::Error,
    },

    /// RPC server encountered a runtime error
    #[error("RPC server error: {0}")]
    ServerError(String),
}

/// Snapshot RPC server
pub struct RpcServer {
    listener: TcpListener,
    router: Router,
}

impl RpcServer {
    /// Bind the RPC server
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the specified address fails.
    pub async fn new(config: &RpcConfig, handler: SnapshotRpcHandler) -> Result<Self, RpcServerError> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|e| RpcServerError::BindError {
                address: config.listen_address.clone(),
                source: e,
            })?;

        tracing::info!(
            address = %config.listen_address,
            "Snapshot RPC server bound successfully"
        );

        Ok(Self {
            listener,
            router: router(handler),
        })
    }

    /// The address actually bound, e.g. when configured with port 0
    ///
    /// # Errors
    ///
    /// Returns an error if the socket's local address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the RPC server until shutdown signal is received
    ///
    /// In-flight requests are allowed to finish; each is bounded by the
    /// total budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a runtime error.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), RpcServerError> {
        tracing::info!("Snapshot RPC server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Snapshot RPC server received shutdown signal");
            })
            .await
            .map_err(|e| RpcServerError::ServerError(e.to_string()))?;

        tracing::info!("Snapshot RPC server stopped");
        Ok(())
    }
}

/// Build the router for the snapshot calls and the liveness probe
pub fn router(handler: SnapshotRpcHandler) -> Router {
    let timeout = handler.coordinator().budget().total_budget() + REQUEST_TIMEOUT_SLACK;
    router_with_timeout(handler, timeout)
}

fn router_with_timeout(handler: SnapshotRpcHandler, timeout: Duration) -> Router {
    Router::new()
        .route("/v1/snapshot/create", post(create_handler))
        .route("/v1/snapshot/delete", post(delete_handler))
        .route("/health/live", get(liveness_handler))
        .with_state(Arc::new(handler))
        .layer(TimeoutLayer::new(timeout))
        .layer(middleware::map_response(envelope_on_timeout))
}

/// The timeout layer answers 408 with an empty body; callers still get an envelope
async fn envelope_on_timeout(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        tracing::warn!("Snapshot request cut off by the HTTP timeout");
        envelope(StatusCode::GATEWAY_TIMEOUT, CommandStatus::failure().into())
    } else {
        response
    }
}

fn envelope(code: StatusCode, response: SnapshotResponse) -> Response {
    (
        code,
        [(header::CONTENT_TYPE, "application/json")],
        response.status,
    )
        .into_response()
}

fn status_code(error: &SnapshotError) -> StatusCode {
    match error {
        SnapshotError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        SnapshotError::Transport(_) => StatusCode::BAD_GATEWAY,
        SnapshotError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn into_response(result: Result<SnapshotResponse, RpcError>) -> Response {
    let (code, response) = match result {
        Ok(response) => (StatusCode::OK, response),
        Err(RpcError { response, error }) => {
            tracing::warn!("Snapshot request failed: {error}");
            (status_code(&error), response)
        }
    };

    envelope(code, response)
}

/// Snapshot create handler
///
/// Dropping this future (client gone) drops the pending control exchange.
async fn create_handler(
    State(handler): State<Arc<SnapshotRpcHandler>>,
    Json(request): Json<SnapshotCreateRequest>,
) -> Response {
    into_response(handler.snapshot_create(request).await)
}

/// Snapshot delete handler
async fn delete_handler(
    State(handler): State<Arc<SnapshotRpcHandler>>,
    Json(request): Json<SnapshotDeleteRequest>,
) -> Response {
    into_response(handler.snapshot_delete(request).await)
}

/// Liveness probe handler
async fn liveness_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}
