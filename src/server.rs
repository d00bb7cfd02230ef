//! HTTP API boundary.
//!
//! Two routes: `POST /send-email` admits a request and returns its id
//! without waiting on delivery; `GET /email-status/{request_id}` polls the
//! ledger. Status lookups never error: an unknown id is a normal outcome.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::credentials::CredentialProvider;
use crate::dispatch::DispatchPool;
use crate::error::RelayError;
use crate::ledger::{DeliveryStatus, StatusLedger};
use crate::request::{DeliveryJob, RequestId};
use crate::validate::{self, SendPayload};

/// Shared state for the routes. All collaborators are injected; the
/// handlers hold no ambient globals.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<StatusLedger>,
    pub pool: Arc<DispatchPool>,
    pub credentials: Arc<dyn CredentialProvider>,
}

#[derive(Debug, Serialize)]
struct SendResponse {
    message: String,
    request_id: RequestId,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    request_id: String,
    status: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Build the relay router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/send-email", post(send_email))
        .route("/email-status/{request_id}", get(email_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router until ctrl-c.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("relay listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install ctrl-c handler: {e}");
    }
}

/// `POST /send-email` - validate, admit, and return the request id.
async fn send_email(
    State(state): State<AppState>,
    Json(payload): Json<SendPayload>,
) -> Result<Json<SendResponse>, ApiError> {
    let request = validate::validate(payload)?;
    let sender = state
        .credentials
        .resolve()
        .ok_or(RelayError::MissingCredentials)?;

    let id = RequestId::new();
    state.ledger.set(id, DeliveryStatus::Pending);

    let job = DeliveryJob::new(id, request, sender);
    if let Err(err) = state.pool.submit(job).await {
        // The job never entered the pool; drop the orphan entry so every
        // tracked id keeps a delivery history.
        state.ledger.remove(id);
        return Err(err.into());
    }

    info!(request_id = %id, "email request admitted");
    Ok(Json(SendResponse {
        message: "Email request accepted".to_string(),
        request_id: id,
    }))
}

/// `GET /email-status/{request_id}` - poll the ledger.
async fn email_status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Json<StatusResponse> {
    // Malformed ids read the same as never-issued ones.
    let status = RequestId::parse(&request_id)
        .and_then(|id| state.ledger.get(id))
        .map(|status| status.to_string())
        .unwrap_or_else(|| "Request ID not found".to_string());

    Json(StatusResponse { request_id, status })
}

/// Error → HTTP mapping for the API boundary.
struct ApiError(RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RelayError::Validation(_) | RelayError::MissingCredentials => StatusCode::BAD_REQUEST,
            RelayError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}
