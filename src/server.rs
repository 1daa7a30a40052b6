//! JSON HTTP surface for the job posting operations.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/createVectorEmbeddings` | Ingest the configured source document |
//! | `POST` | `/createJobPosting` | Generate and record a posting for `{user_query}` |
//! | `POST` | `/deleteJobPosting` | Delete the record `{id}` |
//! | `POST` | `/deleteJobPostings` | Delete every record |
//! | `POST` | `/deleteVectorEmbeddings` | Delete every stored chunk |
//! | `GET`  | `/jobPostings` | List records, newest first |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "validation_error", "message": "user_query is required and must not be blank" } }
//! ```
//!
//! Status codes: validation 400, content policy 422, embedding and
//! generation 502, store, dimension and config errors 500.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::error::Error;
use crate::models::JobPostingRecord;
use crate::service::{DeleteOutcome, IngestReport, JobPostingService};

type AppState = Arc<JobPostingService>;

/// Build the service from `config` and serve on `[server].bind` until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = Arc::new(JobPostingService::from_config(config).await?);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "job posting server listening");
    println!("Job posting server listening on http://{}", config.server.bind);
    serve(listener, service).await
}

/// Serve `service` on an already bound listener.
pub async fn serve(
    listener: tokio::net::TcpListener,
    service: Arc<JobPostingService>,
) -> anyhow::Result<()> {
    axum::serve(listener, router(service)).await?;
    Ok(())
}

/// All routes, with CORS applied.
pub fn router(service: Arc<JobPostingService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/createVectorEmbeddings", post(handle_create_embeddings))
        .route("/createJobPosting", post(handle_create_job_posting))
        .route("/deleteJobPosting", post(handle_delete_job_posting))
        .route("/deleteJobPostings", post(handle_delete_job_postings))
        .route("/deleteVectorEmbeddings", post(handle_delete_embeddings))
        .route("/jobPostings", get(handle_list_job_postings))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(service)
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

/// Internal error type that converts into an Axum HTTP response.
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

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::ContentPolicy(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Embedding(_) | Error::Generation(_) => StatusCode::BAD_GATEWAY,
            Error::Store(_) | Error::DimensionMismatch { .. } | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Malformed or missing JSON bodies are validation failures.
fn bad_body(rejection: JsonRejection) -> AppError {
    AppError::from(Error::Validation(rejection.body_text()))
}

// ============ Handlers ============

#[derive(Deserialize)]
struct CreateJobPostingRequest {
    #[serde(default)]
    user_query: Option<String>,
}

#[derive(Deserialize)]
struct DeleteJobPostingRequest {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Serialize)]
struct ListResponse {
    postings: Vec<JobPostingRecord>,
}

async fn handle_create_embeddings(
    State(service): State<AppState>,
) -> Result<Json<IngestReport>, AppError> {
    Ok(Json(service.create_vector_embeddings().await?))
}

async fn handle_create_job_posting(
    State(service): State<AppState>,
    body: Result<Json<CreateJobPostingRequest>, JsonRejection>,
) -> Result<Json<JobPostingRecord>, AppError> {
    let Json(req) = body.map_err(bad_body)?;
    let record = service
        .create_job_posting(req.user_query.as_deref())
        .await?;
    Ok(Json(record))
}

async fn handle_delete_job_posting(
    State(service): State<AppState>,
    body: Result<Json<DeleteJobPostingRequest>, JsonRejection>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let Json(req) = body.map_err(bad_body)?;
    let id = req.id.unwrap_or_default();
    Ok(Json(service.delete_job_posting(&id).await?))
}

async fn handle_delete_job_postings(
    State(service): State<AppState>,
) -> Result<Json<DeleteOutcome>, AppError> {
    Ok(Json(service.delete_job_postings().await?))
}

async fn handle_delete_embeddings(
    State(service): State<AppState>,
) -> Result<Json<DeleteOutcome>, AppError> {
    Ok(Json(service.delete_vector_embeddings().await?))
}

async fn handle_list_job_postings(
    State(service): State<AppState>,
) -> Result<Json<ListResponse>, AppError> {
    let postings = service.list_job_postings().await?;
    Ok(Json(ListResponse { postings }))
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
