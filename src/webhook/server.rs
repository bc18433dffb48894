//! HTTP surface for the webhook receiver.
//!
//! | Route                 | Purpose                              |
//! |-----------------------|--------------------------------------|
//! | `POST /webhook`       | ingest one event                     |
//! | `GET /events`         | full log, oldest first               |
//! | `GET /events/{job_id}`| log entries for one job              |
//! | `GET /jobs/{job_id}`  | reconciled job state                 |
//! | `GET /health`         | liveness and event count             |

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::event::WebhookEvent;
use super::receiver::{HealthReport, JobView, WebhookReceiver};
use crate::config::ReceiverConfig;
use crate::error::CreoleError;

/// How long in-flight downloads may run after the listener stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Shared state handed to every handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub receiver: Arc<WebhookReceiver>,
    pub config: Arc<ReceiverConfig>,
}

impl AppState {
    pub fn new(receiver: Arc<WebhookReceiver>, config: ReceiverConfig) -> Self {
        Self {
            receiver,
            config: Arc::new(config),
        }
    }
}

/// Handler error, rendered as `{ "error": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl From<CreoleError> for AppError {
    fn from(err: CreoleError) -> Self {
        match err {
            CreoleError::MalformedWebhook(msg) | CreoleError::Validation(msg) => {
                Self::BadRequest(msg)
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Body of a successful `POST /webhook`.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    pub message: String,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// POST /webhook
///
/// The body is read as raw bytes so a missing or wrong `Content-Type` still
/// reaches validation and yields a 400 rather than a framework rejection.
async fn receive_webhook(State(state): State<AppState>, body: Bytes) -> AppResult<Json<WebhookAck>> {
    let outcome = state.receiver.ingest(&body)?;
    Ok(Json(WebhookAck {
        status: "success",
        message: outcome.message(),
        job_id: outcome.event.job_id.clone(),
        warning: outcome.warning,
    }))
}

/// GET /events
async fn list_events(State(state): State<AppState>) -> Json<Vec<WebhookEvent>> {
    Json(state.receiver.all_events())
}

/// GET /events/{job_id}
async fn list_job_events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Json<Vec<WebhookEvent>> {
    Json(state.receiver.events_for_job(&job_id))
}

/// GET /jobs/{job_id}
async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> AppResult<Json<JobView>> {
    state
        .receiver
        .job_view(&job_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No events recorded for job {job_id}")))
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.receiver.health())
}

/// Routes without middleware.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/webhook", post(receive_webhook))
        .route("/events", get(list_events))
        .route("/events/{job_id}", get(list_job_events))
        .route("/jobs/{job_id}", get(get_job))
        .route("/health", get(health_check))
}

/// Build the full application [`Router`] with all middleware layers.
///
/// Applied bottom-up: request id, tracing, request-id propagation,
/// timeout, panic recovery.
pub fn build_router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    routes()
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}

/// Bind, serve until a termination signal, then drain downloads.
pub async fn serve(config: ReceiverConfig) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    serve_with_shutdown(listener, config, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve_with_shutdown(
    listener: tokio::net::TcpListener,
    config: ReceiverConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> crate::error::Result<()> {
    let receiver = Arc::new(WebhookReceiver::from_config(&config));
    let state = AppState::new(Arc::clone(&receiver), config);
    let app = build_router(state);

    let addr = listener.local_addr()?;
    tracing::info!(%addr, "Webhook receiver listening");
    tracing::info!("Webhook endpoint: http://{addr}/webhook");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server stopped accepting connections, draining downloads");
    receiver.shutdown(SHUTDOWN_GRACE).await;
    Ok(())
}

/// Wait for SIGINT or (on Unix) SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
