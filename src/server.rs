//! HTTP entry points.
//!
//! Exposes the pipelines as a small JSON API:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question from retrieved context |
//! | `POST` | `/ingest` | Direct-mode ingestion of one text |
//! | `POST` | `/deliver` | Batched delivery-mode ingestion |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Error responses carry a machine-readable code and a message:
//!
//! ```json
//! { "error": { "code": "invalid_input", "message": "question must not be empty" } }
//! ```
//!
//! Validation failures are 400; everything else that reaches the
//! boundary is 500. `/deliver` is best-effort: it returns 200 with the
//! per-record report even when individual records failed, because an
//! at-least-once transport will redeliver what it considers unprocessed.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::answer::AnswerPipeline;
use crate::error::PipelineError;
use crate::ingest::IngestionPipeline;
use crate::models::{DeliveryMessage, IngestReport, TextRecord};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub answer: Arc<AnswerPipeline>,
    pub ingest: Arc<IngestionPipeline>,
    /// Largest accepted `/deliver` batch.
    pub max_batch: usize,
}

/// Build the router. Separated from [`run_server`] so tests can serve it
/// on an ephemeral port.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/ingest", post(handle_ingest))
        .route("/deliver", post(handle_deliver))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process terminates.
pub async fn run_server(bind: &str, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "ragmill server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: code.to_string(),
        message: message.into(),
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let status = match err {
            PipelineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

/// Answer a question. Empty or missing question → 400 before any
/// external call; upstream failures → 500 with the error kind.
async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let result = state.answer.answer(&request.question).await?;
    Ok(Json(AskResponse {
        answer: result.text,
    }))
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    #[serde(default)]
    text: String,
    /// Optional caller-supplied record id; generated when absent.
    #[serde(default)]
    id: Option<String>,
}

#[derive(Serialize)]
struct IngestResponse {
    status: String,
    document_ids: Vec<String>,
}

/// Direct-mode ingestion of one text. A single record either fully
/// succeeds (200 with the stored document ids) or fails with the status
/// its error kind implies.
async fn handle_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    if request.text.trim().is_empty() {
        return Err(bad_request("invalid_input", "text must not be empty"));
    }

    let record = match request.id {
        Some(id) => TextRecord::new(id, request.text),
        None => TextRecord::anonymous(request.text),
    };

    let report = state.ingest.ingest_direct(record).await;
    if let Some(failure) = report.failed.first() {
        let status = if failure.code == "invalid_input" {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        return Err(AppError {
            status,
            code: failure.code.clone(),
            message: failure.message.clone(),
        });
    }

    Ok(Json(IngestResponse {
        status: "ok".to_string(),
        document_ids: report.succeeded,
    }))
}

// ============ POST /deliver ============

#[derive(Deserialize)]
struct DeliverRequest {
    records: Option<Vec<DeliveryMessage>>,
}

/// Batched delivery entry. Rejects only an undecodable envelope or an
/// oversized batch; per-record failures ride back in a 200 report so the
/// transport's redelivery machinery stays in charge of retries.
async fn handle_deliver(
    State(state): State<AppState>,
    Json(request): Json<DeliverRequest>,
) -> Result<Json<IngestReport>, AppError> {
    let records = request
        .records
        .ok_or_else(|| bad_request("invalid_input", "records field is required"))?;

    if records.len() > state.max_batch {
        return Err(bad_request(
            "invalid_input",
            format!(
                "batch of {} exceeds maximum of {}",
                records.len(),
                state.max_batch
            ),
        ));
    }

    let report = state.ingest.ingest_delivery(records).await;
    Ok(Json(report))
}
